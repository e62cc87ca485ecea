//! Reconciles requested generation length with model capacity

/// Upper bound used when the model declares no maximum context length
pub const MAX_LENGTH: usize = 10_000;

/// Resolve a requested length against the model's maximum context length.
///
/// Negative `requested` means "use the model default"; a `model_capacity` of
/// zero or less means the model declares no maximum. Cases are checked in order.
pub fn resolve_length(requested: i64, model_capacity: i64) -> usize {
    if requested < 0 && model_capacity > 0 {
        model_capacity as usize
    } else if model_capacity > 0 && model_capacity < requested {
        model_capacity as usize
    } else if requested < 0 {
        MAX_LENGTH
    } else {
        requested as usize
    }
}
