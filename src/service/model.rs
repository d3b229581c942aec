//! Wire types exchanged with the service. Attribute bags are plain JSON
//! objects; identifiers are UUIDs assigned by the service on create.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A record of one entity type with an open set of attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub logical_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Entity {
    pub fn new(logical_name: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            id: None,
            attributes: Map::new(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Reference to this record, once it has an id.
    pub fn reference(&self) -> Option<EntityReference> {
        self.id
            .map(|id| EntityReference::new(self.logical_name.clone(), id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityReference {
    pub logical_name: String,
    pub id: Uuid,
}

impl EntityReference {
    pub fn new(logical_name: impl Into<String>, id: Uuid) -> Self {
        Self {
            logical_name: logical_name.into(),
            id,
        }
    }
}

/// Links `related` records to `target` through a named relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociateRequest {
    pub target: EntityReference,
    pub relationship: String,
    pub related: Vec<EntityReference>,
}

/// Invokes a named service action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl ExecuteRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Map::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// Equality-filtered query over one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub logical_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub filter: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

impl QueryRequest {
    pub fn new(logical_name: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            columns: Vec::new(),
            filter: Map::new(),
            page_size: None,
        }
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filter(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(attribute.into(), value.into());
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

/// One page of query results. `paging_cookie` resumes the query when
/// `more_records` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPage {
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub more_records: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging_cookie: Option<String>,
}

/// Identity the service associates with a connection's credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub user_id: Uuid,
    pub organization: String,
}
