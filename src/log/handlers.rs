use super::service::LogService;
use crate::transport::error::{RpcError, RpcResult};
use crate::transport::protocol::Payload;

/// Answers one log workload request with its `*_ok` reply.
pub async fn handle_log_request(log: &LogService, payload: Payload) -> RpcResult<Payload> {
    match payload {
        Payload::Send { key, msg } => {
            let offset = log.append(&key, msg).await?;
            Ok(Payload::SendOk { offset })
        }
        Payload::Forward { key, msg } => {
            let offset = log.append_forwarded(&key, msg).await?;
            Ok(Payload::ForwardOk { offset })
        }
        Payload::Poll { offsets } => {
            let msgs = log.poll(offsets).await?;
            Ok(Payload::PollOk { msgs })
        }
        Payload::CommitOffsets { offsets } => {
            log.commit_offsets(offsets).await?;
            Ok(Payload::CommitOffsetsOk)
        }
        Payload::ListCommittedOffsets { keys } => {
            let offsets = log.list_committed_offsets(keys).await?;
            Ok(Payload::ListCommittedOffsetsOk { offsets })
        }
        other => Err(RpcError::not_supported(format!(
            "{:?} is not a log request",
            other
        ))),
    }
}
