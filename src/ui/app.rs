use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::common::{SyncCommand, SyncEvent};

use super::components::input_bar::{self, InputAction};
use super::state::AppState;

/// Console front end: reads commands from stdin and prints events.
pub struct ChatApp {
    state: AppState,
    command_sender: mpsc::Sender<SyncCommand>,
    event_receiver: mpsc::Receiver<SyncEvent>,
}

impl ChatApp {
    pub fn new(
        user_id: String,
        command_sender: mpsc::Sender<SyncCommand>,
        event_receiver: mpsc::Receiver<SyncEvent>,
    ) -> Self {
        Self {
            state: AppState::new(user_id),
            command_sender,
            event_receiver,
        }
    }

    pub async fn run(mut self) -> std::io::Result<()> {
        println!("{}", input_bar::HELP);
        self.send_command(SyncCommand::RecentChats);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    if !self.handle_input(&line) {
                        break;
                    }
                }
                event = self.event_receiver.recv() => {
                    let Some(event) = event else {
                        log::warn!("Sync loop closed the event channel");
                        break;
                    };
                    self.handle_event(event);
                }
            }
        }
        Ok(())
    }

    /// Returns false when the user asked to quit.
    fn handle_input(&self, line: &str) -> bool {
        match input_bar::parse(line) {
            None => {}
            Some(InputAction::Command(command)) => self.send_command(command),
            Some(InputAction::Help) => println!("{}", input_bar::HELP),
            Some(InputAction::Invalid(reason)) => println!("! {reason}"),
            Some(InputAction::Quit) => return false,
        }
        true
    }

    fn handle_event(&mut self, event: SyncEvent) {
        let rendered = self.state.apply(event);
        for line in &rendered.lines {
            println!("{line}");
        }
        // Everything printed is on screen.
        for message_id in rendered.visible {
            self.send_command(SyncCommand::MarkVisible { message_id });
        }
    }

    fn send_command(&self, command: SyncCommand) {
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send command to sync loop: {err}");
        }
    }
}
