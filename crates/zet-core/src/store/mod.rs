// ── Reactive identity storage ──

mod registry;

pub use registry::IdentityRegistry;
