pub mod notifiers;
pub mod traits;

pub use notifiers::DiscordNotifier;
pub use traits::NotifierPlugin;
