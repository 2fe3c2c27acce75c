use nix::ifaddrs::getifaddrs;
use nix::net::if_::InterfaceFlags;

use crate::control::LinkError;

const LOOPBACK: &str = "lo";

/// Lists interfaces that are administratively up, loopback excluded.
///
/// `getifaddrs` yields one entry per address family, so names are
/// deduplicated while keeping the order the kernel reports them in.
pub fn up_interfaces() -> Result<Vec<String>, LinkError> {
    let entries = getifaddrs().map_err(|source| LinkError::Enumerate { source })?;
    Ok(select_up(
        entries.map(|entry| (entry.interface_name, entry.flags)),
    ))
}

fn select_up<I>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, InterfaceFlags)>,
{
    let mut names: Vec<String> = Vec::new();
    for (name, flags) in entries {
        if !flags.contains(InterfaceFlags::IFF_UP)
            || flags.contains(InterfaceFlags::IFF_LOOPBACK)
            || name == LOOPBACK
        {
            continue;
        }
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, flags: InterfaceFlags) -> (String, InterfaceFlags) {
        (name.to_owned(), flags)
    }

    #[test]
    fn keeps_up_interfaces_in_order_without_duplicates() {
        let up = InterfaceFlags::IFF_UP;
        let entries = vec![
            entry("lo", up | InterfaceFlags::IFF_LOOPBACK),
            entry("wlan0", up),
            entry("eth0", up),
            entry("wlan0", up),
            entry("docker0", InterfaceFlags::empty()),
        ];

        assert_eq!(select_up(entries), vec!["wlan0", "eth0"]);
    }

    #[test]
    fn drops_loopback_by_name_even_without_flag() {
        let entries = vec![entry("lo", InterfaceFlags::IFF_UP)];
        assert!(select_up(entries).is_empty());
    }
}
