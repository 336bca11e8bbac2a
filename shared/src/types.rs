/// Workspace-wide fallible result type.
pub type Result<T> = anyhow::Result<T>;
