//! Group `membersContent` fan-out.

use crate::core::{Flag, Method, Operation, OperationResult, ResourceKind, Result, SclError, StatusCode};
use crate::router::Router;
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Outcome of one member operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub id: String,
    pub status_code: StatusCode,
    pub last_modified_time: String,
    pub result_body: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembersContentResponse {
    pub members_content_responses: Vec<MemberResponse>,
}

impl MemberResponse {
    fn from_result(member: String, result: OperationResult) -> Self {
        let body = result
            .representation
            .map(|raw| serde_json::from_str(&raw).unwrap_or(Value::String(raw)))
            .unwrap_or(Value::Null);
        let last_modified_time = body
            .get("lastModifiedTime")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Utc::now().to_rfc3339());
        Self {
            id: member,
            status_code: result.status_code,
            last_modified_time,
            result_body: body,
        }
    }
}

/// Replays an operation against every member of a group.
///
/// Member operations run as separate tasks, at most `concurrency` at a
/// time; responses keep the order of the `members` list whatever the
/// completion order.
pub struct FanoutEngine {
    concurrency: usize,
}

impl FanoutEngine {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub async fn execute(
        &self,
        router: &Router,
        operation: &Operation,
        group_uri: &str,
        suffix: &str,
    ) -> Result<OperationResult> {
        let ctx = router.context();
        let group = ctx
            .store
            .lazy_find(group_uri)
            .await?
            .filter(|r| r.resource_type == ResourceKind::Group)
            .ok_or_else(|| SclError::not_found(format!("group '{}' not found", group_uri)))?;
        ctx.access
            .check(group.access_right_id.as_deref(), &operation.identity, Flag::Read)
            .await?;

        let members: Vec<String> = group.attribute("members")?.unwrap_or_default();
        debug!(group = %group_uri, members = members.len(), method = %operation.method, "fan-out");

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let tasks = members.iter().map(|member| {
            let router = router.clone();
            let permits = permits.clone();
            let member_op = operation.retarget(format!("{}{}", member, suffix));
            tokio::spawn(async move {
                let _permit = permits.acquire_owned().await;
                router.dispatch(member_op).await
            })
        });
        let outcomes = join_all(tasks.collect::<Vec<_>>()).await;

        let responses = members
            .into_iter()
            .zip(outcomes)
            .map(|(member, outcome)| {
                let result = outcome.unwrap_or_else(|err| {
                    warn!(member = %member, error = %err, "member operation aborted");
                    OperationResult::error(StatusCode::InternalServerError, err.to_string())
                });
                MemberResponse::from_result(member, result)
            })
            .collect();

        let body = serde_json::to_string(&MembersContentResponse {
            members_content_responses: responses,
        })
        .map_err(|err| SclError::Internal(err.to_string()))?;

        let status = if operation.method == Method::Create {
            StatusCode::Created
        } else {
            StatusCode::Ok
        };
        Ok(OperationResult::new(status, Some(body)))
    }
}
