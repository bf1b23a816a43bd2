//! Basic example: connect, list running VMs, and walk one VM's snapshots.
//!
//! Run with: cargo run --features native --example basic -- /path/to/vm.vmx

use std::env;

use vix::{ConnectOptions, FindItemType, Host, Snapshot, Vix};

fn print_tree(snapshot: &Snapshot, depth: usize) -> vix::Result<()> {
    println!("{}- {}", "  ".repeat(depth), snapshot.display_name()?);
    for i in 0..snapshot.num_children()? {
        print_tree(&snapshot.child(i)?, depth + 1)?;
    }
    Ok(())
}

fn main() -> vix::Result<()> {
    println!("vix-bridge {} (API version {})", vix::version::CRATE, vix::version::API);

    let vix = Vix::native();
    let host = match Host::connect(&vix, ConnectOptions::default()) {
        Ok(h) => h,
        Err(e) => {
            println!("Could not connect to the local host: {}", e);
            return Ok(());
        }
    };

    println!("\n--- Running VMs ---");
    for path in host.find_items(FindItemType::RunningVms, 10)? {
        println!("  {}", path);
    }

    let Some(vmx) = env::args().nth(1) else {
        println!("\nNo .vmx path given - skipping VM details");
        host.disconnect();
        return Ok(());
    };

    println!("\n--- {} ---", vmx);
    let vm = host.open_vm(&vmx)?;
    println!("  vCPUs: {}", vm.num_vcpus()?);
    println!("  Memory: {} MB", vm.memory_size()?);
    println!("  Power state: {:?}", vm.power_state()?);

    println!("\n--- Snapshots ---");
    for i in 0..vm.num_root_snapshots()? {
        print_tree(&vm.root_snapshot(i)?, 0)?;
    }

    vm.close();
    host.disconnect();
    println!("\nDone");
    Ok(())
}
