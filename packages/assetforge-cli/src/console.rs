use assetforge_client::{
    AudioPlayer, Capabilities, DesktopNotifier, DesktopToast, EffectError, Permission, SoundCue,
};
use assetforge_sdk::{Notification, UnreadCountUpdate, UnreadSource};
use std::io::Write;
use std::sync::Arc;

/// Terminal stand-in for desktop popups: prints a boxed toast.
pub struct ConsoleDesktop;

impl DesktopNotifier for ConsoleDesktop {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn show(&self, toast: DesktopToast) -> Result<(), EffectError> {
        println!("💬 [{}] {}", toast.title, toast.body);
        if let Some(link) = &toast.link_url {
            println!("   ↪ {}", link);
        }
        Ok(())
    }
}

/// Rings the terminal bell.
pub struct ConsoleBell;

impl AudioPlayer for ConsoleBell {
    fn play(&self, _cue: SoundCue) -> Result<(), EffectError> {
        let mut stdout = std::io::stdout();
        stdout
            .write_all(b"\x07")
            .and_then(|_| stdout.flush())
            .map_err(|e| EffectError::Audio(e.to_string()))
    }
}

pub fn capabilities(quiet: bool) -> Capabilities {
    if quiet {
        return Capabilities::none();
    }
    Capabilities::none()
        .with_desktop(Arc::new(ConsoleDesktop))
        .with_audio(Arc::new(ConsoleBell))
}

pub fn format_notification(notification: &Notification) -> String {
    let marker = if notification.read { " " } else { "●" };
    let mut line = format!(
        "{} [{}] {} ({})",
        marker,
        notification.kind,
        notification.content,
        notification.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(sender) = &notification.sender {
        line.push_str(&format!(" from {}", sender.display_name));
    }
    line.push_str(&format!("\n     id: {}", notification.id));
    line
}

pub fn format_unread(update: &UnreadCountUpdate) -> String {
    let source = match update.source {
        UnreadSource::Push => "push",
        UnreadSource::Reconcile => "sync",
    };
    format!("📮 Unread: {} ({})", update.unread_count, source)
}
