//! Document Editor
//!
//! This demo drives a small editor machine through editing, saving and an
//! idle autosave.
//!
//! Key concepts:
//! - Events carry payloads (`Type` holds the new text)
//! - Actions run before the transition, so `save` commits before re-entering Reading
//! - A field guard keeps the draft under a length limit without touching other fields
//! - Subscribers hear `StateChange` and `ContextChange` as they happen
//! - An `after` transition autosaves when Editing goes idle
//!
//! Run with: cargo run --example document_editor

use chartwell::builder::{DelayedTransition, EventHandler, MachineBuilder, MachineConfig, StateNode};
use chartwell::core::Event;
use chartwell::engine::ChangeKind;
use chartwell::{field_guard, state_enum};
use std::time::Duration;

state_enum! {
    enum Mode {
        Reading,
        Editing,
    }
}

#[derive(Debug)]
enum EditorEvent {
    Begin,
    Type(String),
    Save,
}

impl Event for EditorEvent {
    fn name(&self) -> &str {
        match self {
            Self::Begin | Self::Type(_) => "edit",
            Self::Save => "save",
        }
    }
}

#[derive(Clone, PartialEq, Debug, Default)]
struct Document {
    committed: String,
    draft: String,
    saves: u32,
}

const MAX_DRAFT: usize = 40;

fn commit(doc: &mut Document) {
    doc.committed = doc.draft.clone();
    doc.saves += 1;
}

fn editor() -> MachineConfig<Mode, EditorEvent, Document> {
    MachineBuilder::new()
        .initial(Mode::Reading)
        .context(Document::default())
        .guard(field_guard!(Document, draft, |doc| doc.draft.len() <= MAX_DRAFT))
        .state(
            Mode::Reading,
            StateNode::new().on("edit", EventHandler::to(Mode::Editing)),
        )
        .state(
            Mode::Editing,
            StateNode::new()
                .on(
                    "edit",
                    EventHandler::new().action(|doc: &mut Document, event: &EditorEvent| {
                        if let EditorEvent::Type(text) = event {
                            doc.draft = text.clone();
                        }
                    }),
                )
                .on(
                    "save",
                    EventHandler::to(Mode::Reading).action(|doc: &mut Document, _| commit(doc)),
                )
                .after(
                    Duration::from_millis(300),
                    DelayedTransition::to(Mode::Reading).action(commit),
                ),
        )
        .build()
        .expect("editor configuration is complete")
}

#[tokio::main]
async fn main() {
    println!("=== Document Editor ===\n");

    let config = editor();
    let machine = config.create();
    machine.start().expect("initial state is defined");

    let subscription = machine.subscribe(|snapshot, kind| match kind {
        ChangeKind::StateChange => println!("  [state]   now {:?}", snapshot.state),
        ChangeKind::ContextChange => println!(
            "  [context] draft={:?} committed={:?} saves={}",
            snapshot.context.draft, snapshot.context.committed, snapshot.context.saves
        ),
    });

    println!("Begin editing:");
    machine.send(EditorEvent::Begin).expect("edit is handled in Reading");

    println!("\nType a draft:");
    machine
        .send(EditorEvent::Type("Hello, machines".into()))
        .expect("edit is handled in Editing");

    println!("\nType a draft that is too long (guard reverts only the draft):");
    machine
        .send(EditorEvent::Type("x".repeat(MAX_DRAFT + 1)))
        .expect("edit is handled in Editing");
    println!("  draft is still {:?}", machine.context().draft);

    println!("\nSave:");
    machine.send(EditorEvent::Save).expect("save is handled in Editing");

    println!("\nSaving while reading is rejected:");
    match machine.send(EditorEvent::Save) {
        Ok(()) => println!("  unexpectedly accepted"),
        Err(err) => println!("  error: {err}"),
    }

    println!("\nEdit again and go idle (autosave after 300ms):");
    machine.send(EditorEvent::Begin).expect("edit is handled in Reading");
    machine
        .send(EditorEvent::Type("Autosaved text".into()))
        .expect("edit is handled in Editing");
    tokio::time::sleep(Duration::from_millis(350)).await;

    subscription.unsubscribe();

    let snapshot = machine.snapshot();
    println!("\nFinal state: {:?}", snapshot.state);
    println!("Committed: {:?} after {} saves", snapshot.context.committed, snapshot.context.saves);

    println!("\nPath:");
    for transition in machine.history().transitions() {
        println!("  {:?} -> {:?} ({:?})", transition.from, transition.to, transition.cause);
    }
}
