//! The five thinking-mode drivers and the adaptive dispatcher (spec §4.2
//! through §4.5, §2's dispatch diagram).

pub mod adaptive;
pub mod ensemble;
pub mod racing;
pub mod sequential;
