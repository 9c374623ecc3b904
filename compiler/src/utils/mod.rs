pub mod cc;
pub mod loc;
