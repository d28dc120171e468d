/// Error types for script encoding operations.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Push data exceeds the maximum size encodable with OP_PUSHDATA4.
    #[error("data too big: {0} bytes")]
    DataTooBig(usize),
}
