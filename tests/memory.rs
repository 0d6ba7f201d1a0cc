mod common;

use color_eyre::eyre::Result;

use arc_jtag::link::instruction;
use arc_jtag::{DebugLink, Error, JtagState, ScanRequest, TransactionMode};
use common::{init_logging, SimTarget};

fn link() -> DebugLink<SimTarget> {
    init_logging();
    DebugLink::new(SimTarget::new())
}

#[test]
fn empty_memory_accesses_issue_no_scans() -> Result<()> {
    let mut link = link();
    link.write_memory(0x1000, &[])?;
    link.read_memory(0x1000, &mut [])?;
    assert!(link.transport().batches.is_empty());
    Ok(())
}

#[test]
fn memory_round_trip() -> Result<()> {
    let mut link = link();
    link.write_memory(0x2000, &[0xAABBCCDD, 0x11223344])?;

    let mut words = [0; 2];
    link.read_memory(0x2000, &mut words)?;
    assert_eq!(words, [0xAABBCCDD, 0x11223344]);
    Ok(())
}

#[test]
fn address_is_sent_once_per_batch() -> Result<()> {
    let mut link = link();
    link.write_memory(0x100, &[1, 2, 3, 4])?;

    let sim = link.transport();
    assert_eq!(sim.addresses_written(), vec![0x100]);
    assert_eq!(sim.data_written(), vec![1, 2, 3, 4]);
    assert_eq!(sim.memory[&0x10c], 4);
    Ok(())
}

#[test]
fn write_pauses_after_address_and_read_does_not() -> Result<()> {
    let mut link = link();
    link.write_memory(0x40, &[5])?;
    assert_eq!(link.transport().last_batch()[3],
        ScanRequest::DataOut { bits: 32, value: 0x40, end: JtagState::PauseDR });

    let mut words = [0; 1];
    link.read_memory(0x40, &mut words)?;
    let batch = link.transport().last_batch();
    // The command register is still selected from the write's closing reset
    assert_eq!(batch[0], ScanRequest::DataOut { bits: 4, value: TransactionMode::ReadMemory.code(), end: JtagState::PauseDR });
    assert_eq!(batch[2], ScanRequest::DataOut { bits: 32, value: 0x40, end: JtagState::Idle });
    assert_eq!(batch[3], ScanRequest::Instruction { bits: 4, value: instruction::DATA, end: JtagState::PauseIR });
    assert_eq!(words, [5]);
    Ok(())
}

#[test]
fn failed_read_leaves_words_untouched() {
    let mut link = link();
    link.transport_mut().memory.insert(0x2000, 0x1234);
    link.transport_mut().fail_next = true;

    let mut words = [0xFFFF_FFFF; 2];
    let result = link.read_memory(0x2000, &mut words);
    assert!(matches!(result, Err(Error::Transport(_))));
    assert_eq!(words, [0xFFFF_FFFF; 2]);
}

#[test]
fn operation_after_failure_resynchronises() -> Result<()> {
    let mut link = link();
    link.transport_mut().fail_next = true;
    assert!(link.write_memory(0x0, &[1]).is_err());
    assert_eq!(link.current_transaction(), None);

    link.write_memory(0x0, &[2])?;
    let batch = link.transport().last_batch();
    // Full reset first, then the write transaction
    assert_eq!(batch[0], ScanRequest::Instruction { bits: 4, value: instruction::TRANSACTION_CMD, end: JtagState::PauseIR });
    assert_eq!(batch[1], ScanRequest::DataOut { bits: 4, value: TransactionMode::NoOp.code(), end: JtagState::Idle });
    assert_eq!(batch[2], ScanRequest::DataOut { bits: 4, value: TransactionMode::WriteMemory.code(), end: JtagState::PauseDR });
    assert_eq!(link.transport().memory[&0x0], 2);
    Ok(())
}
