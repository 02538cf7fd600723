use mapalloc::MemMap;

fn main() {
    let mut alloc = MemMap::new();

    let a = alloc.allocate(64).expect("allocation of 64 bytes");
    println!("Requested 64 bytes, received {:?}", a);

    let b = alloc.allocate_zeroed(128).expect("allocation of 128 bytes");
    println!("Requested 128 zeroed bytes, received {:?}", b);

    unsafe {
        a.as_ptr().write(42);
        println!("First byte of a: {}", a.as_ptr().read());
        println!("First byte of b: {}", b.as_ptr().read());

        alloc.free(a.as_ptr()).expect("free a");
        alloc.free(b.as_ptr()).expect("free b");
    }

    // Both blocks are parked now. A request that fits the smaller one
    // gets it back instead of a fresh mapping.
    let c = alloc.allocate(40).expect("allocation of 40 bytes");
    println!("Requested 40 bytes, received {:?}", c);

    if c == a {
        println!("Reused the 64-byte block at {:?}", c);
    } else {
        println!("Got a different block at {:?}", c);
    }
}
