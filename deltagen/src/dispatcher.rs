use crate::abort::AbortFlag;
use crate::channel::Channel;
use crate::command::Command;
use crate::config::DeltaGenConfig;
use crate::models::confirmation::DispatchResult;
use crate::models::variant::VariantCommand;
use std::time::Duration;
use tracing::debug;

// replies to the subscription itself, dropped so they are not taken for confirmations
const SUBSCRIBE_DRAIN_LINES: usize = 8;

/// Opt in to variant_state events and swallow whatever DeltaGen answers to that.
pub fn subscribe_variant_state<C: Channel + ?Sized>(channel: &mut C, config: &DeltaGenConfig) {
    channel.send(&Command::SubscribeVariantState.to_string());
    for _ in 0..SUBSCRIBE_DRAIN_LINES {
        if channel.receive(config.command_delay()).is_none() {
            break;
        }
    }
}

/// Sends variant commands one by one, strictly in order, optionally waiting for the
/// variant_state event of each before the next goes out.
pub struct Dispatcher<'a> {
    delay: Duration,
    confirmation_timeout: Duration,
    abort: &'a AbortFlag,
}

impl<'a> Dispatcher<'a> {
    pub fn new(config: &DeltaGenConfig, abort: &'a AbortFlag) -> Self {
        Self {
            delay: config.command_delay(),
            confirmation_timeout: config.confirmation_timeout(),
            abort,
        }
    }

    /// Dispatch `commands` and report one result per command actually sent.
    /// Stops early when aborted; whatever was already sent stays sent.
    pub fn dispatch<C: Channel + ?Sized>(
        &self,
        channel: &mut C,
        commands: &[VariantCommand],
        check_confirmation: bool,
        mut on_result: impl FnMut(&DispatchResult),
    ) -> Vec<DispatchResult> {
        let mut results = Vec::with_capacity(commands.len());

        for (index, command) in commands.iter().enumerate() {
            // DeltaGen drops commands that arrive too quickly
            if self.abort.sleep(self.delay) {
                break;
            }

            channel.send(command.as_str());

            let result = if check_confirmation {
                let response = channel.receive(self.confirmation_timeout);
                DispatchResult::from_response(index, command, response.as_deref())
            } else {
                DispatchResult::unchecked(index)
            };
            debug!("{command} -> {result:?}");

            on_result(&result);
            results.push(result);

            if self.abort.is_aborted() {
                break;
            }
        }

        results
    }
}
