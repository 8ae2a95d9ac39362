//! CRUD vocabulary: the five standard operation keys, their requests and
//! their payloads.
//!
//! A CRUD service exposes `GET_ALL`, `GET`, `POST`, `PUT` and `DELETE`. Since
//! one operation set carries a single request type and a single payload type,
//! the five shapes are unified in [`CrudRequest`] and [`CrudPayload`].

use serde::Serialize;

/// The five CRUD operation keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CrudOp {
    /// Fetch every entity
    #[serde(rename = "GET_ALL")]
    GetAll,
    /// Fetch one entity by id
    #[serde(rename = "GET")]
    Get,
    /// Create an entity
    #[serde(rename = "POST")]
    Post,
    /// Update an entity by id
    #[serde(rename = "PUT")]
    Put,
    /// Delete an entity by id
    #[serde(rename = "DELETE")]
    Delete,
}

impl CrudOp {
    /// Every CRUD key, in declaration order
    pub const ALL: [Self; 5] = [Self::GetAll, Self::Get, Self::Post, Self::Put, Self::Delete];

    /// Conventional upper-case operation name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GetAll => "GET_ALL",
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for CrudOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Request for one CRUD operation
///
/// - `Id`: entity identifier
/// - `C`: creation payload
/// - `U`: update payload
#[derive(Debug, Clone, PartialEq)]
pub enum CrudRequest<Id, C, U> {
    /// Arguments for `GET_ALL`
    GetAll,
    /// Arguments for `GET`
    Get(Id),
    /// Arguments for `POST`
    Post(C),
    /// Arguments for `PUT`
    Put(Id, U),
    /// Arguments for `DELETE`
    Delete(Id),
}

impl<Id, C, U> CrudRequest<Id, C, U> {
    /// The operation this request is meant for
    #[must_use]
    pub const fn op(&self) -> CrudOp {
        match self {
            Self::GetAll => CrudOp::GetAll,
            Self::Get(_) => CrudOp::Get,
            Self::Post(_) => CrudOp::Post,
            Self::Put(..) => CrudOp::Put,
            Self::Delete(_) => CrudOp::Delete,
        }
    }
}

/// Result of one CRUD operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CrudPayload<E> {
    /// Every entity (`GET_ALL`)
    Many(Vec<E>),
    /// The entity, if it exists (`GET`)
    One(Option<E>),
    /// The created entity (`POST`)
    Created(E),
    /// The updated entity, if it existed (`PUT`)
    Updated(Option<E>),
    /// Deletion finished (`DELETE`)
    Deleted,
}

impl<E> CrudPayload<E> {
    /// The entity list of a `Many` payload
    #[must_use]
    pub fn as_many(&self) -> Option<&[E]> {
        match self {
            Self::Many(entities) => Some(entities.as_slice()),
            _ => None,
        }
    }

    /// The single entity carried by `One`, `Created` or `Updated`
    #[must_use]
    pub const fn as_entity(&self) -> Option<&E> {
        match self {
            Self::One(Some(entity)) | Self::Created(entity) | Self::Updated(Some(entity)) => {
                Some(entity)
            },
            _ => None,
        }
    }
}
