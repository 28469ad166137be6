//! # Deferred Commands
//!
//! Structural changes recorded during a [`for_each`](crate::Ecs::for_each)
//! walk and applied afterwards with
//! [`Ecs::apply_commands`](crate::Ecs::apply_commands).
//!
//! Commands run in recording order. A command whose entity handle went stale
//! before it ran (destroyed by an earlier command, for example) is skipped.
//! A remove of a component the entity no longer has is skipped too.

use super::component::{short_name, Component};
use super::entity::EntityHandle;
use super::world::Ecs;

/// One recorded mutation.
enum Command {
    /// Destroy the entity and all of its components.
    Destroy {
        entity: EntityHandle,
    },
    /// Attach a component value.
    Add {
        entity: EntityHandle,
        component: &'static str,
        apply: Box<dyn FnOnce(&mut Ecs, EntityHandle)>,
    },
    /// Detach and drop a component.
    Remove {
        entity: EntityHandle,
        component: &'static str,
        apply: fn(&mut Ecs, EntityHandle),
    },
}

impl Command {
    fn entity(&self) -> EntityHandle {
        match self {
            Self::Destroy { entity } | Self::Add { entity, .. } | Self::Remove { entity, .. } => {
                *entity
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Destroy { .. } => "destroy",
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
        }
    }
}

fn remove_if_present<T: Component>(ecs: &mut Ecs, entity: EntityHandle) {
    if ecs.has_component::<T>(entity) {
        drop(ecs.remove_component::<T>(entity));
    } else {
        tracing::debug!(
            entity = %entity,
            component = short_name::<T>(),
            "skipped remove of absent component"
        );
    }
}

/// Ordered queue of deferred structural changes.
///
/// # Example
///
/// ```rust,ignore
/// let mut commands = CommandQueue::new();
/// ecs.for_each_entity(|entity, health: &mut Health| {
///     if health.0 == 0 {
///         commands.destroy(entity);
///     }
/// });
/// ecs.apply_commands(&mut commands);
/// ```
#[derive(Default)]
pub struct CommandQueue {
    commands: Vec<Command>,
}

impl CommandQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Checks if nothing is recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Records destruction of `entity`.
    pub fn destroy(&mut self, entity: EntityHandle) {
        self.commands.push(Command::Destroy { entity });
    }

    /// Records attaching `value` to `entity`.
    ///
    /// Adding a component the entity already has when the queue is applied
    /// panics, the same as [`Ecs::add_component`].
    pub fn add_component<T: Component>(&mut self, entity: EntityHandle, value: T) {
        self.commands.push(Command::Add {
            entity,
            component: short_name::<T>(),
            apply: Box::new(move |ecs: &mut Ecs, entity: EntityHandle| {
                ecs.add_component(entity, value);
            }),
        });
    }

    /// Records removal of `T` from `entity`.
    pub fn remove_component<T: Component>(&mut self, entity: EntityHandle) {
        self.commands.push(Command::Remove {
            entity,
            component: short_name::<T>(),
            apply: remove_if_present::<T>,
        });
    }

    /// Drops every recorded command without running it.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Runs and drains every recorded command, in order.
    ///
    /// Returns the number of commands that ran (skipped ones excluded).
    pub fn apply(&mut self, ecs: &mut Ecs) -> usize {
        let mut applied = 0;
        for command in self.commands.drain(..) {
            let entity = command.entity();
            if !ecs.is_valid(entity) {
                tracing::debug!(entity = %entity, command = command.label(), "skipped command for stale entity");
                continue;
            }

            match command {
                Command::Destroy { entity } => {
                    ecs.destroy_entity(entity);
                }
                Command::Add { entity, component, apply } => {
                    tracing::trace!(entity = %entity, component, "applying deferred add");
                    apply(ecs, entity);
                }
                Command::Remove { entity, component, apply } => {
                    tracing::trace!(entity = %entity, component, "applying deferred remove");
                    apply(ecs, entity);
                }
            }
            applied += 1;
        }
        applied
    }
}
