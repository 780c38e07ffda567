use std::net::Ipv4Addr;

/// First non-loopback IPv4 address of this host, so the overlay URL can be
/// opened from another machine on the LAN.
#[cfg(unix)]
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let mut interfaces: *mut libc::ifaddrs = std::ptr::null_mut();

    // SAFETY: getifaddrs fills `interfaces` with a linked list that stays
    // valid until the matching freeifaddrs below; every node and address
    // pointer is null-checked before it is dereferenced.
    unsafe {
        if libc::getifaddrs(&mut interfaces) != 0 {
            return None;
        }

        let mut found = None;
        let mut cursor = interfaces;
        while !cursor.is_null() {
            let entry = &*cursor;
            cursor = entry.ifa_next;

            if entry.ifa_addr.is_null()
                || i32::from((*entry.ifa_addr).sa_family) != libc::AF_INET
            {
                continue;
            }

            let addr = &*entry.ifa_addr.cast::<libc::sockaddr_in>();
            let ip = Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr));
            if !ip.is_loopback() {
                found = Some(ip);
                break;
            }
        }

        libc::freeifaddrs(interfaces);
        found
    }
}

#[cfg(not(unix))]
pub fn local_ipv4() -> Option<Ipv4Addr> {
    None
}

pub fn display_ipv4(ip: Option<Ipv4Addr>) -> String {
    ip.map_or_else(|| "N/A".to_owned(), |ip| ip.to_string())
}
