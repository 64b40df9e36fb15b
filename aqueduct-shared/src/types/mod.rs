pub mod archetype;
pub mod codes;
pub mod history;
pub mod notification;
pub mod patch;
pub mod properties;
pub mod twin;
