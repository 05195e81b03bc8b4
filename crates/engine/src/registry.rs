//! Command registry: the symbol table from `f_id` to executable commands.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::command::Command;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown command: {id}")]
    UnknownCommand { id: String },

    #[error("a different command is already registered as {id}")]
    DuplicateRegistration { id: String },
}

fn same_command(a: &Arc<dyn Command>, b: &Arc<dyn Command>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Collects command registrations at startup.
///
/// Registering the identical `Arc` twice is accepted (plugin hot reload
/// re-announces its commands); a different implementation under a taken id
/// is rejected.
#[derive(Default)]
pub struct CommandRegistryBuilder {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        id: impl Into<String>,
        command: Arc<dyn Command>,
    ) -> Result<&mut Self, RegistryError> {
        let id = id.into();
        match self.commands.get(&id) {
            Some(existing) if same_command(existing, &command) => {}
            Some(_) => return Err(RegistryError::DuplicateRegistration { id }),
            None => {
                self.commands.insert(id, command);
            }
        }
        Ok(self)
    }

    /// Register the command produced by `factory`. The factory runs once, at
    /// registration.
    pub fn register_factory<F>(
        &mut self,
        id: impl Into<String>,
        factory: F,
    ) -> Result<&mut Self, RegistryError>
    where
        F: FnOnce() -> Arc<dyn Command>,
    {
        let id = id.into();
        if self.commands.contains_key(&id) {
            return Err(RegistryError::DuplicateRegistration { id });
        }
        self.commands.insert(id, factory());
        Ok(self)
    }

    /// Freeze the registrations.
    pub fn build(self) -> CommandRegistry {
        CommandRegistry {
            commands: Arc::new(self.commands),
        }
    }
}

/// Immutable, cheaply cloneable command lookup table.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: Arc<HashMap<String, Arc<dyn Command>>>,
}

impl CommandRegistry {
    pub fn lookup(&self, id: &str) -> Result<Arc<dyn Command>, RegistryError> {
        self.commands
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownCommand { id: id.to_string() })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.commands.contains_key(id)
    }

    /// Fail on the first id that is not registered.
    pub fn check_all<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Result<(), RegistryError> {
        for id in ids {
            if !self.contains(id) {
                return Err(RegistryError::UnknownCommand { id: id.to_string() });
            }
        }
        Ok(())
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.ids())
            .finish()
    }
}
