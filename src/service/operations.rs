//! [`Operation`] adapters that route each batch request to the matching
//! [`ServiceConnection`] call.

use crate::executor::operation::{Operation, OperationFuture};
use crate::service::client::ServiceConnection;
use crate::service::model::{
    AssociateRequest, Entity, EntityReference, ExecuteRequest, QueryRequest,
};
use crate::service::paging::{retrieve_all, PageLimit};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Default, Clone, Copy)]
pub struct CreateEntity;

impl Operation<ServiceConnection, Entity> for CreateEntity {
    type Response = Uuid;

    fn apply<'a>(
        &'a self,
        request: &'a Entity,
        connection: &'a mut ServiceConnection,
    ) -> OperationFuture<'a, Uuid> {
        Box::pin(connection.create(request))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UpdateEntity;

impl Operation<ServiceConnection, Entity> for UpdateEntity {
    type Response = ();

    fn apply<'a>(
        &'a self,
        request: &'a Entity,
        connection: &'a mut ServiceConnection,
    ) -> OperationFuture<'a, ()> {
        Box::pin(connection.update(request))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DeleteEntity;

impl Operation<ServiceConnection, EntityReference> for DeleteEntity {
    type Response = ();

    fn apply<'a>(
        &'a self,
        request: &'a EntityReference,
        connection: &'a mut ServiceConnection,
    ) -> OperationFuture<'a, ()> {
        Box::pin(connection.delete(request))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AssociateEntities;

impl Operation<ServiceConnection, AssociateRequest> for AssociateEntities {
    type Response = ();

    fn apply<'a>(
        &'a self,
        request: &'a AssociateRequest,
        connection: &'a mut ServiceConnection,
    ) -> OperationFuture<'a, ()> {
        Box::pin(connection.associate(request))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExecuteAction;

impl Operation<ServiceConnection, ExecuteRequest> for ExecuteAction {
    type Response = Value;

    fn apply<'a>(
        &'a self,
        request: &'a ExecuteRequest,
        connection: &'a mut ServiceConnection,
    ) -> OperationFuture<'a, Value> {
        Box::pin(connection.execute(request))
    }
}

/// Runs each query to completion, one query per request.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetrieveAll {
    pub limit: PageLimit,
}

impl RetrieveAll {
    pub fn with_limit(limit: PageLimit) -> Self {
        Self { limit }
    }
}

impl Operation<ServiceConnection, QueryRequest> for RetrieveAll {
    type Response = Vec<Entity>;

    fn apply<'a>(
        &'a self,
        request: &'a QueryRequest,
        connection: &'a mut ServiceConnection,
    ) -> OperationFuture<'a, Vec<Entity>> {
        Box::pin(retrieve_all(connection, request, self.limit))
    }
}
