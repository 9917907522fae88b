pub mod search;
pub mod view;

pub use search::SearchIndex;
pub use view::CatalogView;
