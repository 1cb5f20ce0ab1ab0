//! Redis cache backend
//!
//! ```text
//! Redis schema (plain string keys, JSON values, SET ... EX ttl):
//! analytics:{metric}:{dimension}:{channel}:{store}:{weekday}:{from}:{to}:{limit}
//! filtros:canais | filtros:lojas | filtros:dias_semana
//! segmentos:clientes_em_risco
//! ```

pub mod connection;
pub mod util;

pub use connection::{RedisCache, RedisConfig};
