//! Commands and the command bus.
//!
//! The bus is an explicit registry built during wiring: one handler per
//! concrete command type, looked up by the command's runtime type. It is
//! immutable once built and shared by `Arc`.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::RecordedEvent;

/// Trait that all commands implement.
pub trait Command: Send + Sync + fmt::Debug + 'static {
    /// Value returned by the handler on success.
    type Output: Send + 'static;

    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;
}

/// Result of a successfully handled command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// The aggregate affected by the command.
    pub aggregate_id: Uuid,
    /// The events committed and handed to the dispatcher.
    pub events: Vec<RecordedEvent>,
}

impl CommandOutcome {
    /// IDs of the committed events.
    #[must_use]
    pub fn event_ids(&self) -> Vec<Uuid> {
        self.events.iter().map(|e| e.metadata.event_id).collect()
    }
}

/// Executes one command type.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    /// Handles the command.
    async fn handle(&self, command: C) -> Result<C::Output, DomainError>;
}

struct Registration {
    command_type: &'static str,
    handler: Box<dyn Any + Send + Sync>,
}

/// Collects handler registrations before the bus is frozen.
#[derive(Default)]
pub struct CommandBusBuilder {
    handlers: HashMap<TypeId, Registration>,
}

impl fmt::Debug for CommandBusBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBusBuilder")
            .field("commands", &command_names(&self.handlers))
            .finish()
    }
}

impl CommandBusBuilder {
    /// Registers the handler for command type `C`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::DuplicateHandler` if `C` already has a handler.
    pub fn register<C: Command>(
        mut self,
        handler: Arc<dyn CommandHandler<C>>,
    ) -> Result<Self, DomainError> {
        let key = TypeId::of::<C>();
        if self.handlers.contains_key(&key) {
            return Err(DomainError::DuplicateHandler(type_name::<C>()));
        }
        self.handlers.insert(
            key,
            Registration {
                command_type: type_name::<C>(),
                handler: Box::new(handler),
            },
        );
        Ok(self)
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> CommandBus {
        CommandBus {
            handlers: self.handlers,
        }
    }
}

/// Routes a command to its single registered handler.
pub struct CommandBus {
    handlers: HashMap<TypeId, Registration>,
}

impl fmt::Debug for CommandBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBus")
            .field("commands", &command_names(&self.handlers))
            .finish()
    }
}

impl CommandBus {
    /// Starts a new registry.
    #[must_use]
    pub fn builder() -> CommandBusBuilder {
        CommandBusBuilder::default()
    }

    /// Returns whether `C` has a handler.
    #[must_use]
    pub fn is_registered<C: Command>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<C>())
    }

    /// Dispatches a command to its handler.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnregisteredCommand` if no handler is registered
    /// for `C`, otherwise whatever the handler returns.
    #[instrument(
        skip(self, command),
        fields(command_type = command.command_type(), correlation_id = %command.correlation_id())
    )]
    pub async fn dispatch<C: Command>(&self, command: C) -> Result<C::Output, DomainError> {
        let handler = self
            .handlers
            .get(&TypeId::of::<C>())
            .and_then(|registration| {
                registration
                    .handler
                    .downcast_ref::<Arc<dyn CommandHandler<C>>>()
            });
        let Some(handler) = handler else {
            error!(
                command_type = command.command_type(),
                "no handler registered for command"
            );
            return Err(DomainError::UnregisteredCommand(type_name::<C>()));
        };
        debug!("dispatching command");
        handler.handle(command).await
    }
}

fn command_names(handlers: &HashMap<TypeId, Registration>) -> Vec<&'static str> {
    let mut names: Vec<&'static str> = handlers.values().map(|r| r.command_type).collect();
    names.sort_unstable();
    names
}
