//! enode URI helpers

/// Loopback host geth reports in `admin_nodeInfo` when bound to all interfaces
pub const LOOPBACK_HOST: &str = "127.0.0.1";

const SHORT_ID_LEN: usize = 20;

/// Replace the loopback host in an enode URI with the in-cluster host of node `index`.
///
/// Node services are named `node<i>` inside the project namespace, so that is
/// the address node 0 can dial.
pub fn rewrite_loopback(enode: &str, index: u32) -> String {
    enode.replace(LOOPBACK_HOST, &format!("node{}", index))
}

/// Shorten an enode URI for display: the first 20 characters before `@`, then `...`
pub fn shorten(enode: &str) -> String {
    let id = enode.split('@').next().unwrap_or(enode);
    let short: String = id.chars().take(SHORT_ID_LEN).collect();
    format!("{}...", short)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENODE: &str = "enode://6f8a80d14311c39f35f516fa664deaaaa13e85b2f7493f37f6144d86991ec012937307647bd3b9a82abe2974e1407241d54947bbb39763a4cac9f77166ad92a0@127.0.0.1:30303?discport=0";

    #[test]
    fn test_rewrite_loopback() {
        let rewritten = rewrite_loopback(ENODE, 2);
        assert!(rewritten.contains("@node2:30303?discport=0"));
        assert!(!rewritten.contains(LOOPBACK_HOST));
    }

    #[test]
    fn test_rewrite_leaves_other_hosts() {
        let enode = "enode://abc@10.1.2.3:30303";
        assert_eq!(rewrite_loopback(enode, 1), enode);
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten(ENODE), "enode://6f8a80d14311...");
        assert_eq!(shorten("enode://ab@x:1"), "enode://ab...");
    }
}
