//! Shows reference-counted sharing: the block survives releases until
//! the last holder lets go, and only then goes back to the free list.

use mapalloc::MemMap;

fn main() {
    let mut alloc = MemMap::new();

    let block = alloc.allocate(32).expect("allocation of 32 bytes");
    println!("Allocated block at {:?} (count = 1)", block);

    unsafe {
        // Two more holders.
        alloc.retain(block.as_ptr());
        alloc.retain(block.as_ptr());
        println!("Retained twice (count = 3)");

        alloc.release(block.as_ptr()).expect("release");
        alloc.release(block.as_ptr()).expect("release");
        println!("Released twice, block still live (count = 1)");

        block.as_ptr().write(0xAA);
        println!("Last holder wrote {:#x}", block.as_ptr().read());

        // Last release frees the block.
        alloc.release(block.as_ptr()).expect("final release");
        println!("Final release, block parked for reuse");
    }

    let again = alloc.allocate(32).expect("second allocation");
    if again == block {
        println!("Allocation of the same size reused {:?}", again);
    } else {
        println!("Fresh block at {:?}", again);
    }
}
