// ABOUTME: Ephemeral resource handles for the sandbox document and installed modules

pub mod manager;

pub use manager::{
    ResourceCategory, ResourceError, ResourceHandle, ResourceManager, SharedResources,
};
