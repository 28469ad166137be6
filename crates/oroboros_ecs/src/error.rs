//! # ECS Error Types
//!
//! Every invariant violation the ECS can detect. The panicking operations
//! build one of these and panic with its message; the `try_*` twins return
//! it instead, before touching any storage.

use thiserror::Error;

/// Errors that can occur while mutating or querying the ECS.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The handle's generation no longer matches its slot, or it is `ZERO`.
    #[error("stale entity handle: id {id}, generation {generation}")]
    StaleEntity {
        /// Entity id of the handle.
        id: u32,
        /// Generation carried by the handle.
        generation: u32,
    },

    /// Components can only be attached to entities flagged `ECS` or `ECS_ONLY`.
    #[error("entity {id} is not ECS managed, add the Ecs or EcsOnly flag")]
    NotEcsManaged {
        /// Entity id of the handle.
        id: u32,
    },

    /// The entity already owns an archetype signature.
    #[error("entity {id} is already attached to the ECS")]
    AlreadyAttached {
        /// Entity id of the handle.
        id: u32,
    },

    /// The component type was never registered with the ECS.
    #[error("component {component} is not registered, register it before building the ECS")]
    UnregisteredComponent {
        /// Type name of the component.
        component: &'static str,
    },

    /// Double add of the same component type to one entity.
    #[error("component {component} already attached to entity {entity}")]
    DuplicateComponent {
        /// Type name of the component.
        component: &'static str,
        /// Entity id.
        entity: u32,
    },

    /// The component is not attached to the entity.
    #[error("component {component} is not attached to entity {entity}")]
    MissingComponent {
        /// Type name of the component.
        component: &'static str,
        /// Entity id.
        entity: u32,
    },

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
