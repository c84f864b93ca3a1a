//! Channel subscription

use crate::errors::ListenError;
use crate::source::NotificationSource;

/// Subscribe `source` to every channel, in order
///
/// Fails on the first channel that cannot be subscribed; a partially
/// subscribed connection would hide events.
pub async fn subscribe<S>(source: &mut S, channels: &[String]) -> Result<(), ListenError>
where
    S: NotificationSource + ?Sized,
{
    for channel in channels {
        source
            .listen(channel)
            .await
            .map_err(|err| ListenError::Subscription {
                channel: channel.clone(),
                source: err,
            })?;
        crate::debug_log!("Subscribed to channel {:?}", channel);
    }
    Ok(())
}
