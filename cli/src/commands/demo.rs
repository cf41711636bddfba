/// Walkthrough of the two-app setup: the host home page sends a
/// message, the micro app picks it up on mount and answers, and once it is
/// unmounted host updates no longer reach it.
pub const DEMO_SCRIPT: &str = "\
# host home page
navigate /
state
host-send hello from the main app

# entering /micro mounts the guest; it renders the current state immediately
navigate /micro
view micro-app
guest-send micro-app hi main app, this is the micro app
state

# leaving /micro unmounts the guest and releases its listeners
navigate /
host-send are you still there?
status

# re-entering remounts with a single fresh listener
navigate /micro
view micro-app
";
