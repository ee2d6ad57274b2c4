//! Everything the assistant prints.

use chrono::{Local, Timelike};

// ── Idle ────────────────────────────────────────────────────────────────────

pub const ALL_SET: &str = "All set! You can hit the EXPR key at any time to get your agenda, or hit the RELOC key for settings.";
pub const KEYS_REMINDER: &str =
    "You can hit the EXPR key at any time to get your agenda, or hit the RELOC key for settings.";
pub const PREPARING_AGENDA: &str = "I'm preparing your agenda. Please hold!";
pub const AGENDA_FAILED: &str = "I'm so sorry, but I wasn't able to put your agenda together just now. Please try again in a little while!";
pub const RESETTING_WIFI: &str = "I'm resetting Wi-Fi to default. Please hold!";
pub const WIFI_RESET_DONE: &str =
    "Wi-Fi has been reset to default. Please hit the RELOC key to add a new network.";
pub const SOMETHING_WENT_WRONG: &str =
    "I'm sorry, something went wrong on my end. Please feel free to try again!";

// ── Menu ────────────────────────────────────────────────────────────────────

pub const MENU: &str = "Here are some options. Type the number of your selection and hit the RETURN key to proceed (or hit the BACKSPACE key to cancel):\n\
\n\
1. Print your agenda now\n\
2. Schedule a recurring time to print your agenda\n\
3. Connect to a new Wi-Fi network\n\
4. Learn more about this project\n\
5. Disconnect & reset the system\n";
pub const MENU_CANCELED: &str = "Your last action has been canceled!";
pub const MENU_INVALID: &str = "I'm sorry, I didn't catch that. Please try again!";
pub const MENU_TIMED_OUT: &str = "I'm sorry, I didn't catch that. I'll go ahead and close the menu, but please feel free to try again!";
pub const ABOUT: &str = "Mr. Underwood reads the subject lines of your recent email and your upcoming calendar events, then has them summarized into a daily agenda printed right here on the typewriter.\n\
\n\
Your data is used only to write each agenda and is not kept on the device afterwards. Your approximate location is used for local weather and news.\n\
\n\
When you're not getting an agenda, you can use the typewriter as one normally would. Keep the 'KB I/II' switch on 'KB I' and the pitch switch on 10, or your agenda will look a little odd.";

// ── Wi-Fi ───────────────────────────────────────────────────────────────────

pub const WIFI_INTRO: &str = "I can help you keep track of your to-do list by monitoring your Gmail inbox and your Google calendars.\n\
To get started, I just need a little help getting connected.";
pub const ASK_SSID: &str =
    "Please type in your (2.4GHz) Wi-Fi network name (and then hit the RETURN key): ";
pub const CONNECTING: &str =
    "Okay! Give me a few moments, I'm going to try to connect. This may take up to 20 seconds.";
pub const WIFI_TIMED_OUT: &str = "I'm sorry, I didn't catch that. If you want to try connecting to Wi-Fi again, please hit the RELOC key and select it from the menu!";
pub const WIFI_CANCELED: &str = "Okay, I've stopped setting up Wi-Fi. You can hit the RELOC key and select it from the menu whenever you're ready.";

pub fn greeting() -> String {
    format!(
        "Good {}! I'm Mr. Underwood, and I'll be your new personal assistant.",
        time_of_day(Local::now().hour())
    )
}

pub fn unknown_ssid(ssid: &str) -> String {
    format!(
        "I'm so sorry, but I couldn't find a network named '{ssid}'. Would you mind trying that again? "
    )
}

pub fn ask_password(ssid: &str) -> String {
    format!("Great! Now, what's the password for '{ssid}'? ")
}

pub fn connected(ssid: &str) -> String {
    format!("Good news! I've successfully connected to {ssid}.")
}

pub fn not_connected(ssid: &str) -> String {
    format!(
        "I'm so sorry, but I wasn't able to connect to '{ssid}'. Would you mind checking your password and trying again? "
    )
}

fn time_of_day(hour: u32) -> &'static str {
    match hour {
        4..=11 => "morning",
        12..=16 => "afternoon",
        _ => "evening",
    }
}

// ── Account ─────────────────────────────────────────────────────────────────

pub const UNVERIFIED_APP_NOTE: &str = "(Note: while this app is awaiting Google approval, you may see a message that says 'Google hasn't verified this app.' You'll need to tap 'Advanced,' then 'Go to underwood.today (unsafe),' then select each checkbox and hit 'Continue.' Spoiler alert: it's not unsafe, just pending review. I apologize for the extra steps!)";
pub const CONSENT_TIMED_OUT: &str =
    "Oh dear, our session has timed out. Would you mind trying again?";
pub const CONSENT_CANCELED: &str = "Okay, I've stopped waiting for your Google account. You can hit the EXPR key to try again whenever you're ready.";
pub const ACCOUNT_CONNECTED: &str = "Hooray! You've successfully connected your Google account.";

pub fn first_consent(public_url: &str) -> String {
    format!(
        "Now, in order for me to provide your agenda, I'll need to get connected to your Gmail and Google Calendar! To make that happen, please visit this link on your phone: {public_url}"
    )
}

pub fn reconsent(public_url: &str) -> String {
    format!(
        "It looks like I need to get re-connected to your Gmail and Google Calendar! To make that happen, please visit this link on your phone: {public_url}"
    )
}

// ── Schedule ────────────────────────────────────────────────────────────────

pub const SCHEDULE_CHOICES: &str = "Type 'delete' to remove the schedule or 'change' to update the time, and then hit the RETURN key. Or, hit the BACKSPACE key to cancel.";
pub const SCHEDULE_OFFER: &str = "Would you like me to print your agenda at a certain time each day? Type 'set' and then hit the RETURN key to start the scheduler, or hit the BACKSPACE key to cancel.";
pub const SCHEDULE_INVALID: &str = "I didn't quite catch that. Please type 'delete', 'change', or 'set', followed by the RETURN key, or hit the BACKSPACE key to cancel.";
pub const SCHEDULE_DELETED: &str =
    "I've deleted your schedule! You can always set up another one by hitting the RELOC key.";
pub const ASK_TIME: &str =
    "What time would you like to receive your daily agenda? (e.g., '4:35 pm')";
pub const SETTING_UP_SCHEDULE: &str = "Give me a few moments to set up your schedule.";
pub const TIME_INVALID: &str =
    "I didn't quite catch that. Please try again with a format like '4:35 pm'.";
pub const SCHEDULE_TIMED_OUT: &str =
    "I'm sorry, I didn't quite catch that. Please try scheduling your agenda again.";
pub const SCHEDULE_CANCELED: &str = "Your request to adjust your schedule has been canceled.";

pub fn current_schedule(time: &str) -> String {
    format!(
        "You're currently set up to receive your agenda at {}.",
        time.to_lowercase()
    )
}

pub fn scheduled(time: &str) -> String {
    format!("Scheduled! You'll receive your daily agenda at {time}.")
}

// ── Reset ───────────────────────────────────────────────────────────────────

pub const RESET_CONFIRM: &str = "Are you sure you'd like to completely reset the system? This will sever the connection to your Google account, and delete all Wi-Fi settings. Type 'reset' and hit the RETURN key to confirm, or hit the BACKSPACE key to cancel.";
pub const RESET_CANCELED: &str = "Your request to reset the system has been canceled.";
pub const RESET_NOT_CONFIRMED: &str = "I'm sorry, I didn't catch that. I'll go ahead and cancel this request, but please feel free to try again!";
pub const RESET_DONE: &str = "The system has been reset and your Google account has been disconnected. You may now hit the RELOC key to set up a new account, or turn off the machine.";
