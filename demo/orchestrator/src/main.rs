// Arbor Demo - walks one deployment through the nesting lifecycle:
// minting, cross-instance nesting, acceptance, unnesting, the cycle
// defense, and a budgeted recursive burn.

use anyhow::Result;
use balance_ledger::AccountBook;
use colored::Colorize;
use nesting_core::{Address, ChildRef, Config, Directory, NestingLedger, TokenId};
use std::sync::Arc;
use tracing::info;

fn stage(title: &str) {
    println!("\n{}", format!("==== {} ====", title).bold());
}

fn ok(line: &str) {
    println!("  {} {}", "✔".green(), line);
}

fn rejected(line: &str) {
    println!("  {} {}", "✘".red(), line);
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    println!("{}", "Arbor - nestable token ledger demo".bold());

    // One deployment: a shared directory and balance book, two ledger
    // instances playing parent and child collections.
    let directory = Directory::new();
    let book = Arc::new(AccountBook::new());

    let mut relics_config = Config::default();
    relics_config.instance_name = "relics".to_string();
    let relics = NestingLedger::new(
        Address::generate(),
        relics_config,
        directory.clone(),
        book.clone(),
    )
    .register();

    let mut charms_config = Config::default();
    charms_config.instance_name = "charms".to_string();
    let charms = NestingLedger::new(
        Address::generate(),
        charms_config,
        directory.clone(),
        book.clone(),
    )
    .register();

    let alice = Address::generate();
    let bob = Address::generate();
    info!(%alice, %bob, "accounts created");

    stage("Minting");
    let relic = TokenId::new(1);
    relics.mint(alice, relic)?;
    ok(&format!("relic {} minted to alice", relic));
    ok(&format!("alice now holds {} relic(s)", book.balance_of(alice)));

    stage("Nest-minting a charm under the relic");
    let charm = TokenId::new(10);
    charms.nest_mint(relics.address(), charm, relic)?;
    let charm_ref = ChildRef::new(charms.address(), charm);
    ok(&format!(
        "charm {} nest-minted; relic {} has {} pending child(ren)",
        charm,
        relic,
        relics.pending_children_of(relic).len()
    ));
    relics.accept_child(alice, relic, 0, charm_ref)?;
    ok(&format!(
        "alice accepted the charm; active children: {}",
        relics.children_of(relic).len()
    ));
    ok(&format!(
        "root owner of charm {} is alice: {}",
        charm,
        charms.root_owner_of(charm)? == alice
    ));

    stage("Nesting an existing token");
    let pendant = TokenId::new(11);
    charms.mint(bob, pendant)?;
    charms.nest_transfer(bob, bob, relics.address(), pendant, relic)?;
    let pendant_ref = ChildRef::new(charms.address(), pendant);
    ok(&format!(
        "bob nested charm {} under the relic; pending: {}",
        pendant,
        relics.pending_children_of(relic).len()
    ));
    relics.accept_child(alice, relic, 0, pendant_ref)?;
    ok("alice accepted it into the active collection");

    stage("Cycle defense");
    match relics.nest_transfer(alice, alice, charms.address(), relic, charm) {
        Err(e) => rejected(&format!("nesting the relic under its own charm: {}", e)),
        Ok(()) => anyhow::bail!("cycle went undetected"),
    }

    stage("Unnesting");
    relics.unnest_child(alice, relic, bob, 1, pendant_ref, false)?;
    ok(&format!(
        "charm {} unnested back to bob; bob's balance: {}",
        pendant,
        book.balance_of(bob)
    ));

    stage("Budgeted burn");
    match relics.burn(alice, relic, 0) {
        Err(e) => rejected(&format!("burn with budget 0: {}", e)),
        Ok(_) => anyhow::bail!("burn ignored its budget"),
    }
    let burned = relics.burn(alice, relic, 5)?;
    ok(&format!(
        "burn with budget 5 took the relic and {} descendant(s)",
        burned
    ));
    ok(&format!(
        "tokens left - relics: {}, charms: {}",
        relics.token_count(),
        charms.token_count()
    ));

    stage("Wrap-up");
    let relic_events = relics.take_events();
    let charm_events = charms.take_events();
    ok(&format!(
        "events recorded - relics: {}, charms: {}",
        relic_events.len(),
        charm_events.len()
    ));
    ok(&format!(
        "relics metrics - mints: {}, burns: {}, children accepted: {}",
        relics.metrics().mints_total.get(),
        relics.metrics().burns_total.get(),
        relics.metrics().children_accepted_total.get()
    ));

    println!("\n{}", "Demo complete.".bold());
    Ok(())
}
