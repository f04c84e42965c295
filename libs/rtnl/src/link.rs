//! Utilities for operating on a link/interface/device

use futures::TryStreamExt;
use netlink_packet_route::{link::nlas::Nla, LinkMessage};
use rtnetlink::Handle;

/// Get the link index of a link by its name.
///
/// Returns `Ok(None)` when no link with that name exists.
pub async fn get_link_index(
    rt_handle: &Handle,
    link_name: &str,
) -> Result<Option<u32>, rtnetlink::Error> {
    log::trace!("Looking up link index for {}", link_name);

    // Dump all links and match the name here. Filtering by name in the kernel
    // turns a missing link into an opaque netlink error.
    let mut links = rt_handle.link().get().execute();
    while let Some(message) = links.try_next().await.map_err(|err| {
        log::error!("Failed to list links while looking for {}", link_name);
        log::error!("{}", err);
        err
    })? {
        if link_name_of(&message) == Some(link_name) {
            return Ok(Some(message.header.index));
        }
    }

    log::trace!("Link {} does not exist", link_name);
    Ok(None)
}

/// Read the interface name out of a link message
fn link_name_of(message: &LinkMessage) -> Option<&str> {
    message.nlas.iter().find_map(|nla| match nla {
        Nla::IfName(name) => Some(name.as_str()),
        _ => None,
    })
}
