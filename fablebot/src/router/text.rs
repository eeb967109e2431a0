//! User-facing reply texts.
//!
//! Every reply the router can produce lives here, so the command logic
//! stays free of presentation strings.

use crate::models::Author;

/// Timestamp format used when listing stories.
const TIME_FORMAT: &str = "%a, %d %b %Y %H:%M";

pub const WELCOME: &str = "\
Hi! 👋

It looks like this is the first time we've talked, so here's the short \
version of what I do: I'm fablebot, a chat interface to Inform 7, the \
natural-language system for writing interactive fiction. Send me the \
source of a story and I'll compile it and let you play it right here, in \
direct messages or group chats.

Type 'help' for an overview of the commands I understand.";

pub const HELP: &str = "\
Commands I understand:
> story — list your stories
> story add <name> <url> — fetch Inform 7 source from an http(s) URL, compile it, and keep it under <name>
> story remove <name> — forget a story
> story start <name> — begin playing a compiled story
> story end — stop the running story
> option — list your options
> option set prefix <value> — change the meta-command prefix used during play

While a story is running, anything you type goes to the story itself \
unless it starts with your prefix. Writing Inform 7 is a big topic of its \
own; the documentation at http://inform7.com/doc covers it well.";

pub const UNKNOWN_ERROR: &str = "\
Oops, something went wrong on my end and that request didn't complete. \
Give it a moment and try again (or ask whoever runs me to check the logs).";

pub const NEED_NAME_AND_URL: &str = "\
I need both a story name and a URL, e.g. 'story add cellar https://example.com/cellar.ni'.
Story names are a single word (hyphens and underscores are fine), with no spaces.";

pub const NEED_STORY_NAME: &str = "\
I need a story name, e.g. 'story remove cellar'.";

pub const NEED_OPTION_AND_VALUE: &str = "\
I need both an option name and a value, e.g. 'option set prefix ?'.";

pub const NO_ACTIVE_SESSION: &str = "There's no story running at the moment.";

pub const SESSION_DIED: &str = "\
The story's interpreter exited unexpectedly, so that session is over. \
You can restart it with 'story start'.";

pub fn unknown_command(text: &str) -> String {
    format!("I don't understand what '{text}' means. Type 'help' for an overview of commands.")
}

pub fn story_list(author: &Author) -> String {
    if author.stories.is_empty() {
        return format!(
            "There are no stories yet for '{}'.\n\
             Add one with 'story add <name> <url>'.",
            author.id
        );
    }

    let mut out = format!("Stories for '{}':", author.id);
    for story in &author.stories {
        out.push_str(&format!(
            "\n> '{}' — added {}, last updated {}{}",
            story.name,
            story.created_at.format(TIME_FORMAT),
            story.updated_at.format(TIME_FORMAT),
            if story.build.is_some() {
                ""
            } else {
                " (not compiled yet)"
            },
        ));
    }
    out
}

pub fn option_list(author: &Author) -> String {
    format!(
        "Options for '{}':\n> prefix: '{}'\nChange these with 'option set <name> <value>'.",
        author.id, author.options.prefix
    )
}

pub fn added_story(name: &str) -> String {
    format!("Story '{name}' compiled and added to your list.")
}

pub fn removed_story(name: &str) -> String {
    format!("Story '{name}' removed from your list.")
}

pub fn invalid_story(err: &impl std::fmt::Display) -> String {
    format!("I couldn't do that — {err}.")
}

pub fn compile_failed(err: &impl std::fmt::Display) -> String {
    format!("The story didn't compile — {err}")
}

pub fn started_session(name: &str, prefix: &str) -> String {
    format!(
        "Story '{name}' is running. Everything you type now goes to the story; \
         prefix meta-commands with '{prefix}' (e.g. '{prefix}story end' to stop). Have fun! 🎉"
    )
}

pub fn session_already_active(name: &str) -> String {
    format!("A session is already running for story '{name}' — end it with 'story end' first.")
}

pub fn story_not_built(name: &str) -> String {
    format!("Story '{name}' has never compiled successfully, so it can't be started.")
}

pub fn story_in_session(name: &str) -> String {
    format!("Story '{name}' is currently running — end the session before removing it.")
}

pub const STOPPED_SESSION: &str = "Session ended. Your stories are still here when you want them.";

pub fn start_failed(err: &impl std::fmt::Display) -> String {
    format!("I couldn't start that story — {err}.")
}

pub fn run_error(err: &impl std::fmt::Display) -> String {
    format!("I couldn't run that command — {err}.")
}

pub fn set_option(name: &str, value: &str) -> String {
    format!("Option '{name}' set to '{value}'.")
}

pub fn invalid_option(err: &impl std::fmt::Display) -> String {
    format!("I couldn't set that option — {err}.")
}
