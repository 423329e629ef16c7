pub mod api;
pub mod billing;
pub mod bootstrap;
pub mod email;
pub mod geocode;
pub mod health;
pub mod payments;
pub mod submissions;

#[cfg(test)]
pub(crate) mod testing;
