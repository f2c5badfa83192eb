//! Campaign management backend: tenants, segments, templates and campaigns.
//!
//! Implements the persistence, tenant, audience and template capabilities the
//! dispatch engine consumes. Data stored in DashMap (development); swap to
//! PostgreSQL for production.

pub mod store;

pub use store::ManagementStore;
