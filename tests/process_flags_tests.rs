//! Process-wide feature flags from environment variables. These mutate the
//! process environment, so they run serially.

use serial_test::serial;
use std::sync::Arc;

use manifoldmcp::{
    config::ProcessFlags,
    demo::{demo_spec, DemoContext},
    SessionMode, SessionRouter,
};

#[tokio::test]
#[serial]
async fn process_deny_list_hides_a_tool_everywhere() {
    std::env::set_var("MCP_DISABLED_TOOLS", "echo");
    let process_flags = ProcessFlags::from_env();
    std::env::remove_var("MCP_DISABLED_TOOLS");

    let sessions = Arc::new(SessionRouter::new(
        SessionMode::Stateful,
        DemoContext::default(),
        Arc::new(demo_spec()),
        process_flags,
    ));

    let caps = sessions.default_capabilities().unwrap();
    assert!(caps.tool("echo").is_none());
    assert!(caps.tool("uptime").is_some());
    // The REST table shrinks along with the protocol list.
    assert_eq!(caps.rest_tools().count(), 1);
}

#[tokio::test]
#[serial]
async fn process_allow_list_is_combined_with_request_flags() {
    std::env::set_var("MCP_ENABLED_TOOLS", "echo,uptime");
    let process_flags = ProcessFlags::from_env();
    std::env::remove_var("MCP_ENABLED_TOOLS");

    let sessions = Arc::new(SessionRouter::new(
        SessionMode::Stateful,
        DemoContext::default(),
        Arc::new(demo_spec()),
        process_flags,
    ));

    // Initialize with a narrower request-level allow list; the session
    // sees only the intersection.
    let outcome = sessions
        .dispatch_post(
            None,
            "enabled_tools=uptime",
            serde_json::json!({
                "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}
            }),
        )
        .await
        .unwrap();
    let token = outcome.new_session.unwrap();
    let endpoint = sessions.endpoint(&token).await.unwrap();
    assert!(endpoint.capabilities().tool("uptime").is_some());
    assert!(endpoint.capabilities().tool("echo").is_none());
}

#[test]
#[serial]
fn empty_env_value_is_no_restriction() {
    std::env::set_var("MCP_ENABLED_TOOLS", "");
    let process_flags = ProcessFlags::from_env();
    std::env::remove_var("MCP_ENABLED_TOOLS");
    assert!(process_flags.enabled_tools.is_none());
}
