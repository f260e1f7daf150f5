pub mod domain;
pub mod ports;
pub mod validation;

pub use domain::{
    Comment, HomeNews, NewUser, NewsFilter, SessionClaim, Settings, SharedStory, Story, User,
    UserCredentials, WorkerEvent,
};
pub use ports::{DatabaseService, NotificationService, PortError, PortResult};
pub use validation::ValidationError;
