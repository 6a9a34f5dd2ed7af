use anyhow::Result;
use assetforge_client::NotificationHub;
use assetforge_sdk::{DeliveryChannel, Frequency, NotificationPreferences, NotificationType};
use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum PrefsAction {
    /// Show the locally cached preferences
    Show,
    /// Pull preferences from the server into the local cache
    Refresh,
    /// Change preferences and save them
    Set(PrefsChanges),
}

#[derive(Args, Debug, Default)]
pub struct PrefsChanges {
    /// Enable or disable in-app notifications (the live stream)
    #[arg(long)]
    pub in_app: Option<bool>,
    /// Play a sound for new notifications
    #[arg(long)]
    pub sound: Option<bool>,
    /// Show desktop notifications
    #[arg(long)]
    pub desktop: Option<bool>,
    /// Enable or disable email delivery
    #[arg(long)]
    pub email: Option<bool>,
    /// Email digest frequency (instant, daily, weekly)
    #[arg(long)]
    pub email_frequency: Option<Frequency>,
    /// Enable or disable push delivery
    #[arg(long)]
    pub push: Option<bool>,
    /// Push frequency (instant, daily, weekly)
    #[arg(long)]
    pub push_frequency: Option<Frequency>,
    /// Turn a notification type on for email and push (repeatable)
    #[arg(long = "enable-type")]
    pub enable_types: Vec<NotificationType>,
    /// Turn a notification type off for email and push (repeatable)
    #[arg(long = "disable-type")]
    pub disable_types: Vec<NotificationType>,
}

impl PrefsChanges {
    pub fn is_empty(&self) -> bool {
        self.in_app.is_none()
            && self.sound.is_none()
            && self.desktop.is_none()
            && self.email.is_none()
            && self.email_frequency.is_none()
            && self.push.is_none()
            && self.push_frequency.is_none()
            && self.enable_types.is_empty()
            && self.disable_types.is_empty()
    }

    pub fn apply(&self, prefs: &mut NotificationPreferences) {
        if let Some(enabled) = self.in_app {
            prefs.in_app.enabled = enabled;
        }
        if let Some(sound) = self.sound {
            prefs.in_app.sound = sound;
        }
        if let Some(desktop) = self.desktop {
            prefs.in_app.desktop = desktop;
        }
        apply_channel(&mut prefs.email, self.email, self.email_frequency);
        apply_channel(&mut prefs.push, self.push, self.push_frequency);

        // disable wins when a type is listed in both
        for (types, enabled) in [(&self.enable_types, true), (&self.disable_types, false)] {
            for kind in types {
                prefs.email.types.set(*kind, enabled);
                prefs.push.types.set(*kind, enabled);
            }
        }
    }
}

fn apply_channel(
    channel: &mut DeliveryChannel,
    enabled: Option<bool>,
    frequency: Option<Frequency>,
) {
    if let Some(enabled) = enabled {
        channel.enabled = enabled;
    }
    if let Some(frequency) = frequency {
        channel.frequency = frequency;
    }
}

pub async fn handle_prefs_command(hub: &NotificationHub, action: PrefsAction) -> Result<()> {
    match action {
        PrefsAction::Show => {
            print_preferences(&hub.get_preferences());
        }
        PrefsAction::Refresh => match hub.refresh_preferences().await {
            Ok(prefs) => {
                println!("✅ Preferences refreshed from server");
                print_preferences(&prefs);
            }
            Err(e) => {
                eprintln!("❌ Failed to refresh preferences: {}", e);
                std::process::exit(1);
            }
        },
        PrefsAction::Set(changes) => {
            if changes.is_empty() {
                println!("ℹ️  Nothing to change");
                return Ok(());
            }
            let mut prefs = hub.get_preferences();
            changes.apply(&mut prefs);

            match hub.save_preferences(&prefs).await {
                Ok(()) => {
                    println!("✅ Preferences saved");
                    print_preferences(&prefs);
                }
                Err(e) => {
                    eprintln!("❌ Failed to save preferences: {}", e);
                    eprintln!("   The new values are kept locally and will be used on this device");
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}

fn print_preferences(prefs: &NotificationPreferences) {
    println!("⚙️  Notification preferences:");
    println!(
        "   In-app: {} (desktop: {}, sound: {})",
        on_off(prefs.in_app.enabled),
        on_off(prefs.in_app.desktop),
        on_off(prefs.in_app.sound)
    );
    for (name, channel) in [("Email", &prefs.email), ("Push", &prefs.push)] {
        let types: Vec<&str> = NotificationType::ALL
            .iter()
            .filter(|kind| channel.types.allows(**kind))
            .map(|kind| kind.topic_name())
            .collect();
        println!(
            "   {}: {} ({}) types: {}",
            name,
            on_off(channel.enabled),
            channel.frequency,
            if types.is_empty() {
                "none".to_string()
            } else {
                types.join(", ")
            }
        );
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}
