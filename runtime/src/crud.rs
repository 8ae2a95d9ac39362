//! CRUD services bound as operation sets.
//!
//! [`crud_operations`] turns any [`CrudService`] into an operation set keyed by
//! [`CrudOp`], with [`CrudRequest`] as the request type and [`CrudPayload`] as
//! the payload type, ready to hand to a provider.

use crate::operation::OperationSet;
use crud_context_core::{BoxError, CrudOp, CrudPayload, CrudRequest, OperationError};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by [`CrudService`] methods
pub type ServiceFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Operation set produced by [`crud_operations`] for service `S`
pub type CrudOperationSet<S> = OperationSet<
    CrudOp,
    CrudRequest<<S as CrudService>::Id, <S as CrudService>::Create, <S as CrudService>::Update>,
    CrudPayload<<S as CrudService>::Entity>,
>;

/// A remote (or in-memory) collection of entities
///
/// # Dyn Compatibility
///
/// Methods return explicit `Pin<Box<dyn Future>>` so services can be stored
/// behind `Arc<dyn CrudService<...>>`.
pub trait CrudService: Send + Sync + 'static {
    /// Entity type
    type Entity: Clone + Send + Sync + 'static;
    /// Entity identifier
    type Id: Send + 'static;
    /// Creation payload
    type Create: Send + 'static;
    /// Update payload
    type Update: Send + 'static;
    /// Service failure, normalized into `OperationError` by the binding
    type Error: Into<BoxError> + Send + 'static;

    /// Fetch every entity
    fn get_all(&self) -> ServiceFuture<'_, Vec<Self::Entity>, Self::Error>;

    /// Fetch one entity, `None` if it does not exist
    fn get(&self, id: Self::Id) -> ServiceFuture<'_, Option<Self::Entity>, Self::Error>;

    /// Create an entity and return it
    fn post(&self, input: Self::Create) -> ServiceFuture<'_, Self::Entity, Self::Error>;

    /// Update an entity, `None` if it does not exist
    fn put(
        &self,
        id: Self::Id,
        input: Self::Update,
    ) -> ServiceFuture<'_, Option<Self::Entity>, Self::Error>;

    /// Delete an entity
    fn delete(&self, id: Self::Id) -> ServiceFuture<'_, (), Self::Error>;
}

/// Bind the five CRUD operations of a service
///
/// Each key only accepts its own request variant. A mismatched request (for
/// example `CrudRequest::Delete` sent to `POST`) fails that operation with
/// `FailureKind::InvalidRequest` without touching the service.
#[must_use]
pub fn crud_operations<S: CrudService>(service: Arc<S>) -> CrudOperationSet<S> {
    let mut operations: CrudOperationSet<S> = OperationSet::new();

    for op in CrudOp::ALL {
        let service = Arc::clone(&service);
        operations.insert(op, move |request| run(Arc::clone(&service), op, request));
    }

    operations
}

async fn run<S: CrudService>(
    service: Arc<S>,
    expected: CrudOp,
    request: CrudRequest<S::Id, S::Create, S::Update>,
) -> Result<CrudPayload<S::Entity>, OperationError> {
    if request.op() != expected {
        return Err(OperationError::invalid_request(format!(
            "{} request sent to {expected}",
            request.op()
        )));
    }

    let result = match request {
        CrudRequest::GetAll => service.get_all().await.map(CrudPayload::Many),
        CrudRequest::Get(id) => service.get(id).await.map(CrudPayload::One),
        CrudRequest::Post(input) => service.post(input).await.map(CrudPayload::Created),
        CrudRequest::Put(id, input) => service.put(id, input).await.map(CrudPayload::Updated),
        CrudRequest::Delete(id) => service.delete(id).await.map(|()| CrudPayload::Deleted),
    };

    result.map_err(OperationError::normalize)
}
