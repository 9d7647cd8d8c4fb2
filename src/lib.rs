pub mod service;
pub mod shutdown;
pub mod state;
pub mod switcher;
pub mod traits;

#[cfg(test)]
pub mod test_utils;
