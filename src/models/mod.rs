pub mod events;
pub mod series;
pub mod token;

pub use events::*;
pub use series::*;
pub use token::*;
