pub mod movie;
pub mod stub;
pub mod detail;
pub mod episode;
pub mod progress;

pub use movie::{Movie, MovieKind};
pub use stub::{CatalogPage, MovieStub, Pagination};
pub use detail::{EpisodeServer, MovieDetail, ServerEpisode};
pub use episode::Episode;
pub use progress::ImportProgress;
