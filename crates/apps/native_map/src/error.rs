use foundation::math::ProjectionError;
use layers::AdapterError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("the map is not attached to a surface yet")]
    NotAttached,
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}
