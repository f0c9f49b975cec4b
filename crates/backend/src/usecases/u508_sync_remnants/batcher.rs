use super::error::SyncError;

/// Разбить записи на пачки не больше `size`.
///
/// Порядок сохраняется, все пачки кроме последней полные, пустой вход дает ноль пачек.
pub fn chunk<T>(items: &[T], size: usize) -> Result<std::slice::Chunks<'_, T>, SyncError> {
    if size == 0 {
        return Err(SyncError::InvalidArgument(
            "batch size must be greater than zero".to_string(),
        ));
    }
    Ok(items.chunks(size))
}
