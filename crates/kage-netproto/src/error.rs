use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("datagram too small: {0} bytes")]
    DatagramTooSmall(usize),
    #[error("chunk too small: {0} bytes")]
    ChunkTooSmall(usize),
    #[error("chunk truncated: {claimed} bytes > {remaining} remaining")]
    ChunkTruncated { claimed: usize, remaining: usize },
    #[error("chunk too large: {0} bytes")]
    ChunkTooLarge(usize),
    #[error("packet capacity exceeded")]
    CapacityExceeded,
}
