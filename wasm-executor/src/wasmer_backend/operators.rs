//! Pricing of backend operators.
use crate::opcodes::{Opcode, OpcodeCosts};
use anyhow::Context;
use wasmer::wasmparser::{Operator, Parser, Payload};

/// The accounted opcode of a backend operator, if it has one.
pub(crate) fn opcode_of(operator: &Operator) -> Option<Opcode> {
    let opcode = match operator {
        Operator::Unreachable { .. } => Opcode::Unreachable,
        Operator::Nop { .. } => Opcode::Nop,
        Operator::Block { .. } => Opcode::Block,
        Operator::Loop { .. } => Opcode::Loop,
        Operator::If { .. } => Opcode::If,
        Operator::Else { .. } => Opcode::Else,
        Operator::End { .. } => Opcode::End,
        Operator::Br { .. } => Opcode::Br,
        Operator::BrIf { .. } => Opcode::BrIf,
        Operator::BrTable { .. } => Opcode::BrTable,
        Operator::Return { .. } => Opcode::Return,
        Operator::Call { .. } => Opcode::Call,
        Operator::CallIndirect { .. } => Opcode::CallIndirect,
        Operator::Drop { .. } => Opcode::Drop,
        Operator::Select { .. } => Opcode::Select,
        Operator::TypedSelect { .. } => Opcode::TypedSelect,
        Operator::LocalGet { .. } => Opcode::LocalGet,
        Operator::LocalSet { .. } => Opcode::LocalSet,
        Operator::LocalTee { .. } => Opcode::LocalTee,
        Operator::GlobalGet { .. } => Opcode::GlobalGet,
        Operator::GlobalSet { .. } => Opcode::GlobalSet,
        Operator::I32Load { .. } => Opcode::I32Load,
        Operator::I64Load { .. } => Opcode::I64Load,
        Operator::F32Load { .. } => Opcode::F32Load,
        Operator::F64Load { .. } => Opcode::F64Load,
        Operator::I32Load8S { .. } => Opcode::I32Load8S,
        Operator::I32Load8U { .. } => Opcode::I32Load8U,
        Operator::I32Load16S { .. } => Opcode::I32Load16S,
        Operator::I32Load16U { .. } => Opcode::I32Load16U,
        Operator::I64Load8S { .. } => Opcode::I64Load8S,
        Operator::I64Load8U { .. } => Opcode::I64Load8U,
        Operator::I64Load16S { .. } => Opcode::I64Load16S,
        Operator::I64Load16U { .. } => Opcode::I64Load16U,
        Operator::I64Load32S { .. } => Opcode::I64Load32S,
        Operator::I64Load32U { .. } => Opcode::I64Load32U,
        Operator::I32Store { .. } => Opcode::I32Store,
        Operator::I64Store { .. } => Opcode::I64Store,
        Operator::F32Store { .. } => Opcode::F32Store,
        Operator::F64Store { .. } => Opcode::F64Store,
        Operator::I32Store8 { .. } => Opcode::I32Store8,
        Operator::I32Store16 { .. } => Opcode::I32Store16,
        Operator::I64Store8 { .. } => Opcode::I64Store8,
        Operator::I64Store16 { .. } => Opcode::I64Store16,
        Operator::I64Store32 { .. } => Opcode::I64Store32,
        Operator::MemorySize { .. } => Opcode::MemorySize,
        Operator::MemoryGrow { .. } => Opcode::MemoryGrow,
        Operator::I32Const { .. } => Opcode::I32Const,
        Operator::I64Const { .. } => Opcode::I64Const,
        Operator::F32Const { .. } => Opcode::F32Const,
        Operator::F64Const { .. } => Opcode::F64Const,
        Operator::RefNull { .. } => Opcode::RefNull,
        Operator::RefIsNull { .. } => Opcode::RefIsNull,
        Operator::RefFunc { .. } => Opcode::RefFunc,
        Operator::I32Eqz { .. } => Opcode::I32Eqz,
        Operator::I32Eq { .. } => Opcode::I32Eq,
        Operator::I32Ne { .. } => Opcode::I32Ne,
        Operator::I32LtS { .. } => Opcode::I32LtS,
        Operator::I32LtU { .. } => Opcode::I32LtU,
        Operator::I32GtS { .. } => Opcode::I32GtS,
        Operator::I32GtU { .. } => Opcode::I32GtU,
        Operator::I32LeS { .. } => Opcode::I32LeS,
        Operator::I32LeU { .. } => Opcode::I32LeU,
        Operator::I32GeS { .. } => Opcode::I32GeS,
        Operator::I32GeU { .. } => Opcode::I32GeU,
        Operator::I64Eqz { .. } => Opcode::I64Eqz,
        Operator::I64Eq { .. } => Opcode::I64Eq,
        Operator::I64Ne { .. } => Opcode::I64Ne,
        Operator::I64LtS { .. } => Opcode::I64LtS,
        Operator::I64LtU { .. } => Opcode::I64LtU,
        Operator::I64GtS { .. } => Opcode::I64GtS,
        Operator::I64GtU { .. } => Opcode::I64GtU,
        Operator::I64LeS { .. } => Opcode::I64LeS,
        Operator::I64LeU { .. } => Opcode::I64LeU,
        Operator::I64GeS { .. } => Opcode::I64GeS,
        Operator::I64GeU { .. } => Opcode::I64GeU,
        Operator::F32Eq { .. } => Opcode::F32Eq,
        Operator::F32Ne { .. } => Opcode::F32Ne,
        Operator::F32Lt { .. } => Opcode::F32Lt,
        Operator::F32Gt { .. } => Opcode::F32Gt,
        Operator::F32Le { .. } => Opcode::F32Le,
        Operator::F32Ge { .. } => Opcode::F32Ge,
        Operator::F64Eq { .. } => Opcode::F64Eq,
        Operator::F64Ne { .. } => Opcode::F64Ne,
        Operator::F64Lt { .. } => Opcode::F64Lt,
        Operator::F64Gt { .. } => Opcode::F64Gt,
        Operator::F64Le { .. } => Opcode::F64Le,
        Operator::F64Ge { .. } => Opcode::F64Ge,
        Operator::I32Clz { .. } => Opcode::I32Clz,
        Operator::I32Ctz { .. } => Opcode::I32Ctz,
        Operator::I32Popcnt { .. } => Opcode::I32Popcnt,
        Operator::I32Add { .. } => Opcode::I32Add,
        Operator::I32Sub { .. } => Opcode::I32Sub,
        Operator::I32Mul { .. } => Opcode::I32Mul,
        Operator::I32DivS { .. } => Opcode::I32DivS,
        Operator::I32DivU { .. } => Opcode::I32DivU,
        Operator::I32RemS { .. } => Opcode::I32RemS,
        Operator::I32RemU { .. } => Opcode::I32RemU,
        Operator::I32And { .. } => Opcode::I32And,
        Operator::I32Or { .. } => Opcode::I32Or,
        Operator::I32Xor { .. } => Opcode::I32Xor,
        Operator::I32Shl { .. } => Opcode::I32Shl,
        Operator::I32ShrS { .. } => Opcode::I32ShrS,
        Operator::I32ShrU { .. } => Opcode::I32ShrU,
        Operator::I32Rotl { .. } => Opcode::I32Rotl,
        Operator::I32Rotr { .. } => Opcode::I32Rotr,
        Operator::I64Clz { .. } => Opcode::I64Clz,
        Operator::I64Ctz { .. } => Opcode::I64Ctz,
        Operator::I64Popcnt { .. } => Opcode::I64Popcnt,
        Operator::I64Add { .. } => Opcode::I64Add,
        Operator::I64Sub { .. } => Opcode::I64Sub,
        Operator::I64Mul { .. } => Opcode::I64Mul,
        Operator::I64DivS { .. } => Opcode::I64DivS,
        Operator::I64DivU { .. } => Opcode::I64DivU,
        Operator::I64RemS { .. } => Opcode::I64RemS,
        Operator::I64RemU { .. } => Opcode::I64RemU,
        Operator::I64And { .. } => Opcode::I64And,
        Operator::I64Or { .. } => Opcode::I64Or,
        Operator::I64Xor { .. } => Opcode::I64Xor,
        Operator::I64Shl { .. } => Opcode::I64Shl,
        Operator::I64ShrS { .. } => Opcode::I64ShrS,
        Operator::I64ShrU { .. } => Opcode::I64ShrU,
        Operator::I64Rotl { .. } => Opcode::I64Rotl,
        Operator::I64Rotr { .. } => Opcode::I64Rotr,
        Operator::F32Abs { .. } => Opcode::F32Abs,
        Operator::F32Neg { .. } => Opcode::F32Neg,
        Operator::F32Ceil { .. } => Opcode::F32Ceil,
        Operator::F32Floor { .. } => Opcode::F32Floor,
        Operator::F32Trunc { .. } => Opcode::F32Trunc,
        Operator::F32Nearest { .. } => Opcode::F32Nearest,
        Operator::F32Sqrt { .. } => Opcode::F32Sqrt,
        Operator::F32Add { .. } => Opcode::F32Add,
        Operator::F32Sub { .. } => Opcode::F32Sub,
        Operator::F32Mul { .. } => Opcode::F32Mul,
        Operator::F32Div { .. } => Opcode::F32Div,
        Operator::F32Min { .. } => Opcode::F32Min,
        Operator::F32Max { .. } => Opcode::F32Max,
        Operator::F32Copysign { .. } => Opcode::F32Copysign,
        Operator::F64Abs { .. } => Opcode::F64Abs,
        Operator::F64Neg { .. } => Opcode::F64Neg,
        Operator::F64Ceil { .. } => Opcode::F64Ceil,
        Operator::F64Floor { .. } => Opcode::F64Floor,
        Operator::F64Trunc { .. } => Opcode::F64Trunc,
        Operator::F64Nearest { .. } => Opcode::F64Nearest,
        Operator::F64Sqrt { .. } => Opcode::F64Sqrt,
        Operator::F64Add { .. } => Opcode::F64Add,
        Operator::F64Sub { .. } => Opcode::F64Sub,
        Operator::F64Mul { .. } => Opcode::F64Mul,
        Operator::F64Div { .. } => Opcode::F64Div,
        Operator::F64Min { .. } => Opcode::F64Min,
        Operator::F64Max { .. } => Opcode::F64Max,
        Operator::F64Copysign { .. } => Opcode::F64Copysign,
        Operator::I32WrapI64 { .. } => Opcode::I32WrapI64,
        Operator::I32TruncF32S { .. } => Opcode::I32TruncF32S,
        Operator::I32TruncF32U { .. } => Opcode::I32TruncF32U,
        Operator::I32TruncF64S { .. } => Opcode::I32TruncF64S,
        Operator::I32TruncF64U { .. } => Opcode::I32TruncF64U,
        Operator::I64ExtendI32S { .. } => Opcode::I64ExtendI32S,
        Operator::I64ExtendI32U { .. } => Opcode::I64ExtendI32U,
        Operator::I64TruncF32S { .. } => Opcode::I64TruncF32S,
        Operator::I64TruncF32U { .. } => Opcode::I64TruncF32U,
        Operator::I64TruncF64S { .. } => Opcode::I64TruncF64S,
        Operator::I64TruncF64U { .. } => Opcode::I64TruncF64U,
        Operator::F32ConvertI32S { .. } => Opcode::F32ConvertI32S,
        Operator::F32ConvertI32U { .. } => Opcode::F32ConvertI32U,
        Operator::F32ConvertI64S { .. } => Opcode::F32ConvertI64S,
        Operator::F32ConvertI64U { .. } => Opcode::F32ConvertI64U,
        Operator::F32DemoteF64 { .. } => Opcode::F32DemoteF64,
        Operator::F64ConvertI32S { .. } => Opcode::F64ConvertI32S,
        Operator::F64ConvertI32U { .. } => Opcode::F64ConvertI32U,
        Operator::F64ConvertI64S { .. } => Opcode::F64ConvertI64S,
        Operator::F64ConvertI64U { .. } => Opcode::F64ConvertI64U,
        Operator::F64PromoteF32 { .. } => Opcode::F64PromoteF32,
        Operator::I32ReinterpretF32 { .. } => Opcode::I32ReinterpretF32,
        Operator::I64ReinterpretF64 { .. } => Opcode::I64ReinterpretF64,
        Operator::F32ReinterpretI32 { .. } => Opcode::F32ReinterpretI32,
        Operator::F64ReinterpretI64 { .. } => Opcode::F64ReinterpretI64,
        Operator::I32Extend8S { .. } => Opcode::I32Extend8S,
        Operator::I32Extend16S { .. } => Opcode::I32Extend16S,
        Operator::I64Extend8S { .. } => Opcode::I64Extend8S,
        Operator::I64Extend16S { .. } => Opcode::I64Extend16S,
        Operator::I64Extend32S { .. } => Opcode::I64Extend32S,
        Operator::I32TruncSatF32S { .. } => Opcode::I32TruncSatF32S,
        Operator::I32TruncSatF32U { .. } => Opcode::I32TruncSatF32U,
        Operator::I32TruncSatF64S { .. } => Opcode::I32TruncSatF64S,
        Operator::I32TruncSatF64U { .. } => Opcode::I32TruncSatF64U,
        Operator::I64TruncSatF32S { .. } => Opcode::I64TruncSatF32S,
        Operator::I64TruncSatF32U { .. } => Opcode::I64TruncSatF32U,
        Operator::I64TruncSatF64S { .. } => Opcode::I64TruncSatF64S,
        Operator::I64TruncSatF64U { .. } => Opcode::I64TruncSatF64U,
        Operator::MemoryInit { .. } => Opcode::MemoryInit,
        Operator::DataDrop { .. } => Opcode::DataDrop,
        Operator::MemoryCopy { .. } => Opcode::MemoryCopy,
        Operator::MemoryFill { .. } => Opcode::MemoryFill,
        Operator::TableInit { .. } => Opcode::TableInit,
        Operator::ElemDrop { .. } => Opcode::ElemDrop,
        Operator::TableCopy { .. } => Opcode::TableCopy,
        Operator::TableFill { .. } => Opcode::TableFill,
        Operator::TableGet { .. } => Opcode::TableGet,
        Operator::TableSet { .. } => Opcode::TableSet,
        Operator::TableGrow { .. } => Opcode::TableGrow,
        Operator::TableSize { .. } => Opcode::TableSize,
        Operator::MemoryAtomicNotify { .. } => Opcode::AtomicNotify,
        Operator::MemoryAtomicWait32 { .. } => Opcode::I32AtomicWait,
        Operator::MemoryAtomicWait64 { .. } => Opcode::I64AtomicWait,
        Operator::AtomicFence { .. } => Opcode::AtomicFence,
        Operator::I32AtomicLoad { .. } => Opcode::I32AtomicLoad,
        Operator::I64AtomicLoad { .. } => Opcode::I64AtomicLoad,
        Operator::I32AtomicLoad8U { .. } => Opcode::I32AtomicLoad8U,
        Operator::I32AtomicLoad16U { .. } => Opcode::I32AtomicLoad16U,
        Operator::I64AtomicLoad8U { .. } => Opcode::I64AtomicLoad8U,
        Operator::I64AtomicLoad16U { .. } => Opcode::I64AtomicLoad16U,
        Operator::I64AtomicLoad32U { .. } => Opcode::I64AtomicLoad32U,
        Operator::I32AtomicStore { .. } => Opcode::I32AtomicStore,
        Operator::I64AtomicStore { .. } => Opcode::I64AtomicStore,
        Operator::I32AtomicStore8 { .. } => Opcode::I32AtomicStore8,
        Operator::I32AtomicStore16 { .. } => Opcode::I32AtomicStore16,
        Operator::I64AtomicStore8 { .. } => Opcode::I64AtomicStore8,
        Operator::I64AtomicStore16 { .. } => Opcode::I64AtomicStore16,
        Operator::I64AtomicStore32 { .. } => Opcode::I64AtomicStore32,
        Operator::I32AtomicRmwAdd { .. } => Opcode::I32AtomicRmwAdd,
        Operator::I64AtomicRmwAdd { .. } => Opcode::I64AtomicRmwAdd,
        Operator::I32AtomicRmw8AddU { .. } => Opcode::I32AtomicRmw8AddU,
        Operator::I32AtomicRmw16AddU { .. } => Opcode::I32AtomicRmw16AddU,
        Operator::I64AtomicRmw8AddU { .. } => Opcode::I64AtomicRmw8AddU,
        Operator::I64AtomicRmw16AddU { .. } => Opcode::I64AtomicRmw16AddU,
        Operator::I64AtomicRmw32AddU { .. } => Opcode::I64AtomicRmw32AddU,
        Operator::I32AtomicRmwSub { .. } => Opcode::I32AtomicRmwSub,
        Operator::I64AtomicRmwSub { .. } => Opcode::I64AtomicRmwSub,
        Operator::I32AtomicRmw8SubU { .. } => Opcode::I32AtomicRmw8SubU,
        Operator::I32AtomicRmw16SubU { .. } => Opcode::I32AtomicRmw16SubU,
        Operator::I64AtomicRmw8SubU { .. } => Opcode::I64AtomicRmw8SubU,
        Operator::I64AtomicRmw16SubU { .. } => Opcode::I64AtomicRmw16SubU,
        Operator::I64AtomicRmw32SubU { .. } => Opcode::I64AtomicRmw32SubU,
        Operator::I32AtomicRmwAnd { .. } => Opcode::I32AtomicRmwAnd,
        Operator::I64AtomicRmwAnd { .. } => Opcode::I64AtomicRmwAnd,
        Operator::I32AtomicRmw8AndU { .. } => Opcode::I32AtomicRmw8AndU,
        Operator::I32AtomicRmw16AndU { .. } => Opcode::I32AtomicRmw16AndU,
        Operator::I64AtomicRmw8AndU { .. } => Opcode::I64AtomicRmw8AndU,
        Operator::I64AtomicRmw16AndU { .. } => Opcode::I64AtomicRmw16AndU,
        Operator::I64AtomicRmw32AndU { .. } => Opcode::I64AtomicRmw32AndU,
        Operator::I32AtomicRmwOr { .. } => Opcode::I32AtomicRmwOr,
        Operator::I64AtomicRmwOr { .. } => Opcode::I64AtomicRmwOr,
        Operator::I32AtomicRmw8OrU { .. } => Opcode::I32AtomicRmw8OrU,
        Operator::I32AtomicRmw16OrU { .. } => Opcode::I32AtomicRmw16OrU,
        Operator::I64AtomicRmw8OrU { .. } => Opcode::I64AtomicRmw8OrU,
        Operator::I64AtomicRmw16OrU { .. } => Opcode::I64AtomicRmw16OrU,
        Operator::I64AtomicRmw32OrU { .. } => Opcode::I64AtomicRmw32OrU,
        Operator::I32AtomicRmwXor { .. } => Opcode::I32AtomicRmwXor,
        Operator::I64AtomicRmwXor { .. } => Opcode::I64AtomicRmwXor,
        Operator::I32AtomicRmw8XorU { .. } => Opcode::I32AtomicRmw8XorU,
        Operator::I32AtomicRmw16XorU { .. } => Opcode::I32AtomicRmw16XorU,
        Operator::I64AtomicRmw8XorU { .. } => Opcode::I64AtomicRmw8XorU,
        Operator::I64AtomicRmw16XorU { .. } => Opcode::I64AtomicRmw16XorU,
        Operator::I64AtomicRmw32XorU { .. } => Opcode::I64AtomicRmw32XorU,
        Operator::I32AtomicRmwXchg { .. } => Opcode::I32AtomicRmwXchg,
        Operator::I64AtomicRmwXchg { .. } => Opcode::I64AtomicRmwXchg,
        Operator::I32AtomicRmw8XchgU { .. } => Opcode::I32AtomicRmw8XchgU,
        Operator::I32AtomicRmw16XchgU { .. } => Opcode::I32AtomicRmw16XchgU,
        Operator::I64AtomicRmw8XchgU { .. } => Opcode::I64AtomicRmw8XchgU,
        Operator::I64AtomicRmw16XchgU { .. } => Opcode::I64AtomicRmw16XchgU,
        Operator::I64AtomicRmw32XchgU { .. } => Opcode::I64AtomicRmw32XchgU,
        Operator::I32AtomicRmwCmpxchg { .. } => Opcode::I32AtomicRmwCmpxchg,
        Operator::I64AtomicRmwCmpxchg { .. } => Opcode::I64AtomicRmwCmpxchg,
        Operator::I32AtomicRmw8CmpxchgU { .. } => Opcode::I32AtomicRmw8CmpxchgU,
        Operator::I32AtomicRmw16CmpxchgU { .. } => Opcode::I32AtomicRmw16CmpxchgU,
        Operator::I64AtomicRmw8CmpxchgU { .. } => Opcode::I64AtomicRmw8CmpxchgU,
        Operator::I64AtomicRmw16CmpxchgU { .. } => Opcode::I64AtomicRmw16CmpxchgU,
        Operator::I64AtomicRmw32CmpxchgU { .. } => Opcode::I64AtomicRmw32CmpxchgU,
        Operator::V128Load { .. } => Opcode::V128Load,
        Operator::V128Store { .. } => Opcode::V128Store,
        Operator::V128Const { .. } => Opcode::V128Const,
        Operator::I8x16Splat { .. } => Opcode::I8x16Splat,
        Operator::I8x16ExtractLaneS { .. } => Opcode::I8x16ExtractLaneS,
        Operator::I8x16ExtractLaneU { .. } => Opcode::I8x16ExtractLaneU,
        Operator::I8x16ReplaceLane { .. } => Opcode::I8x16ReplaceLane,
        Operator::I16x8Splat { .. } => Opcode::I16x8Splat,
        Operator::I16x8ExtractLaneS { .. } => Opcode::I16x8ExtractLaneS,
        Operator::I16x8ExtractLaneU { .. } => Opcode::I16x8ExtractLaneU,
        Operator::I16x8ReplaceLane { .. } => Opcode::I16x8ReplaceLane,
        Operator::I32x4Splat { .. } => Opcode::I32x4Splat,
        Operator::I32x4ExtractLane { .. } => Opcode::I32x4ExtractLane,
        Operator::I32x4ReplaceLane { .. } => Opcode::I32x4ReplaceLane,
        Operator::I64x2Splat { .. } => Opcode::I64x2Splat,
        Operator::I64x2ExtractLane { .. } => Opcode::I64x2ExtractLane,
        Operator::I64x2ReplaceLane { .. } => Opcode::I64x2ReplaceLane,
        Operator::F32x4Splat { .. } => Opcode::F32x4Splat,
        Operator::F32x4ExtractLane { .. } => Opcode::F32x4ExtractLane,
        Operator::F32x4ReplaceLane { .. } => Opcode::F32x4ReplaceLane,
        Operator::F64x2Splat { .. } => Opcode::F64x2Splat,
        Operator::F64x2ExtractLane { .. } => Opcode::F64x2ExtractLane,
        Operator::F64x2ReplaceLane { .. } => Opcode::F64x2ReplaceLane,
        Operator::I8x16Eq { .. } => Opcode::I8x16Eq,
        Operator::I8x16Ne { .. } => Opcode::I8x16Ne,
        Operator::I8x16LtS { .. } => Opcode::I8x16LtS,
        Operator::I8x16LtU { .. } => Opcode::I8x16LtU,
        Operator::I8x16GtS { .. } => Opcode::I8x16GtS,
        Operator::I8x16GtU { .. } => Opcode::I8x16GtU,
        Operator::I8x16LeS { .. } => Opcode::I8x16LeS,
        Operator::I8x16LeU { .. } => Opcode::I8x16LeU,
        Operator::I8x16GeS { .. } => Opcode::I8x16GeS,
        Operator::I8x16GeU { .. } => Opcode::I8x16GeU,
        Operator::I16x8Eq { .. } => Opcode::I16x8Eq,
        Operator::I16x8Ne { .. } => Opcode::I16x8Ne,
        Operator::I16x8LtS { .. } => Opcode::I16x8LtS,
        Operator::I16x8LtU { .. } => Opcode::I16x8LtU,
        Operator::I16x8GtS { .. } => Opcode::I16x8GtS,
        Operator::I16x8GtU { .. } => Opcode::I16x8GtU,
        Operator::I16x8LeS { .. } => Opcode::I16x8LeS,
        Operator::I16x8LeU { .. } => Opcode::I16x8LeU,
        Operator::I16x8GeS { .. } => Opcode::I16x8GeS,
        Operator::I16x8GeU { .. } => Opcode::I16x8GeU,
        Operator::I32x4Eq { .. } => Opcode::I32x4Eq,
        Operator::I32x4Ne { .. } => Opcode::I32x4Ne,
        Operator::I32x4LtS { .. } => Opcode::I32x4LtS,
        Operator::I32x4LtU { .. } => Opcode::I32x4LtU,
        Operator::I32x4GtS { .. } => Opcode::I32x4GtS,
        Operator::I32x4GtU { .. } => Opcode::I32x4GtU,
        Operator::I32x4LeS { .. } => Opcode::I32x4LeS,
        Operator::I32x4LeU { .. } => Opcode::I32x4LeU,
        Operator::I32x4GeS { .. } => Opcode::I32x4GeS,
        Operator::I32x4GeU { .. } => Opcode::I32x4GeU,
        Operator::F32x4Eq { .. } => Opcode::F32x4Eq,
        Operator::F32x4Ne { .. } => Opcode::F32x4Ne,
        Operator::F32x4Lt { .. } => Opcode::F32x4Lt,
        Operator::F32x4Gt { .. } => Opcode::F32x4Gt,
        Operator::F32x4Le { .. } => Opcode::F32x4Le,
        Operator::F32x4Ge { .. } => Opcode::F32x4Ge,
        Operator::F64x2Eq { .. } => Opcode::F64x2Eq,
        Operator::F64x2Ne { .. } => Opcode::F64x2Ne,
        Operator::F64x2Lt { .. } => Opcode::F64x2Lt,
        Operator::F64x2Gt { .. } => Opcode::F64x2Gt,
        Operator::F64x2Le { .. } => Opcode::F64x2Le,
        Operator::F64x2Ge { .. } => Opcode::F64x2Ge,
        Operator::V128Not { .. } => Opcode::V128Not,
        Operator::V128And { .. } => Opcode::V128And,
        Operator::V128AndNot { .. } => Opcode::V128AndNot,
        Operator::V128Or { .. } => Opcode::V128Or,
        Operator::V128Xor { .. } => Opcode::V128Xor,
        Operator::V128Bitselect { .. } => Opcode::V128Bitselect,
        Operator::I8x16Neg { .. } => Opcode::I8x16Neg,
        Operator::V128AnyTrue { .. } => Opcode::I8x16AnyTrue,
        Operator::I8x16AllTrue { .. } => Opcode::I8x16AllTrue,
        Operator::I8x16Shl { .. } => Opcode::I8x16Shl,
        Operator::I8x16ShrS { .. } => Opcode::I8x16ShrS,
        Operator::I8x16ShrU { .. } => Opcode::I8x16ShrU,
        Operator::I8x16Add { .. } => Opcode::I8x16Add,
        Operator::I8x16AddSatS { .. } => Opcode::I8x16AddSaturateS,
        Operator::I8x16AddSatU { .. } => Opcode::I8x16AddSaturateU,
        Operator::I8x16Sub { .. } => Opcode::I8x16Sub,
        Operator::I8x16SubSatS { .. } => Opcode::I8x16SubSaturateS,
        Operator::I8x16SubSatU { .. } => Opcode::I8x16SubSaturateU,
        Operator::I8x16MinS { .. } => Opcode::I8x16MinS,
        Operator::I8x16MinU { .. } => Opcode::I8x16MinU,
        Operator::I8x16MaxS { .. } => Opcode::I8x16MaxS,
        Operator::I8x16MaxU { .. } => Opcode::I8x16MaxU,
        Operator::I16x8Neg { .. } => Opcode::I16x8Neg,
        Operator::I16x8AllTrue { .. } => Opcode::I16x8AllTrue,
        Operator::I16x8Shl { .. } => Opcode::I16x8Shl,
        Operator::I16x8ShrS { .. } => Opcode::I16x8ShrS,
        Operator::I16x8ShrU { .. } => Opcode::I16x8ShrU,
        Operator::I16x8Add { .. } => Opcode::I16x8Add,
        Operator::I16x8AddSatS { .. } => Opcode::I16x8AddSaturateS,
        Operator::I16x8AddSatU { .. } => Opcode::I16x8AddSaturateU,
        Operator::I16x8Sub { .. } => Opcode::I16x8Sub,
        Operator::I16x8SubSatS { .. } => Opcode::I16x8SubSaturateS,
        Operator::I16x8SubSatU { .. } => Opcode::I16x8SubSaturateU,
        Operator::I16x8Mul { .. } => Opcode::I16x8Mul,
        Operator::I16x8MinS { .. } => Opcode::I16x8MinS,
        Operator::I16x8MinU { .. } => Opcode::I16x8MinU,
        Operator::I16x8MaxS { .. } => Opcode::I16x8MaxS,
        Operator::I16x8MaxU { .. } => Opcode::I16x8MaxU,
        Operator::I32x4Neg { .. } => Opcode::I32x4Neg,
        Operator::I32x4AllTrue { .. } => Opcode::I32x4AllTrue,
        Operator::I32x4Shl { .. } => Opcode::I32x4Shl,
        Operator::I32x4ShrS { .. } => Opcode::I32x4ShrS,
        Operator::I32x4ShrU { .. } => Opcode::I32x4ShrU,
        Operator::I32x4Add { .. } => Opcode::I32x4Add,
        Operator::I32x4Sub { .. } => Opcode::I32x4Sub,
        Operator::I32x4Mul { .. } => Opcode::I32x4Mul,
        Operator::I32x4MinS { .. } => Opcode::I32x4MinS,
        Operator::I32x4MinU { .. } => Opcode::I32x4MinU,
        Operator::I32x4MaxS { .. } => Opcode::I32x4MaxS,
        Operator::I32x4MaxU { .. } => Opcode::I32x4MaxU,
        Operator::I64x2Neg { .. } => Opcode::I64x2Neg,
        Operator::I64x2AllTrue { .. } => Opcode::I64x2AllTrue,
        Operator::I64x2Shl { .. } => Opcode::I64x2Shl,
        Operator::I64x2ShrS { .. } => Opcode::I64x2ShrS,
        Operator::I64x2ShrU { .. } => Opcode::I64x2ShrU,
        Operator::I64x2Add { .. } => Opcode::I64x2Add,
        Operator::I64x2Sub { .. } => Opcode::I64x2Sub,
        Operator::I64x2Mul { .. } => Opcode::I64x2Mul,
        Operator::F32x4Abs { .. } => Opcode::F32x4Abs,
        Operator::F32x4Neg { .. } => Opcode::F32x4Neg,
        Operator::F32x4Sqrt { .. } => Opcode::F32x4Sqrt,
        Operator::F32x4Add { .. } => Opcode::F32x4Add,
        Operator::F32x4Sub { .. } => Opcode::F32x4Sub,
        Operator::F32x4Mul { .. } => Opcode::F32x4Mul,
        Operator::F32x4Div { .. } => Opcode::F32x4Div,
        Operator::F32x4Min { .. } => Opcode::F32x4Min,
        Operator::F32x4Max { .. } => Opcode::F32x4Max,
        Operator::F64x2Abs { .. } => Opcode::F64x2Abs,
        Operator::F64x2Neg { .. } => Opcode::F64x2Neg,
        Operator::F64x2Sqrt { .. } => Opcode::F64x2Sqrt,
        Operator::F64x2Add { .. } => Opcode::F64x2Add,
        Operator::F64x2Sub { .. } => Opcode::F64x2Sub,
        Operator::F64x2Mul { .. } => Opcode::F64x2Mul,
        Operator::F64x2Div { .. } => Opcode::F64x2Div,
        Operator::F64x2Min { .. } => Opcode::F64x2Min,
        Operator::F64x2Max { .. } => Opcode::F64x2Max,
        Operator::I32x4TruncSatF32x4S { .. } => Opcode::I32x4TruncSatF32x4S,
        Operator::I32x4TruncSatF32x4U { .. } => Opcode::I32x4TruncSatF32x4U,
        Operator::F32x4ConvertI32x4S { .. } => Opcode::F32x4ConvertI32x4S,
        Operator::F32x4ConvertI32x4U { .. } => Opcode::F32x4ConvertI32x4U,
        Operator::I8x16Swizzle { .. } => Opcode::V8x16Swizzle,
        Operator::I8x16Shuffle { .. } => Opcode::V8x16Shuffle,
        Operator::V128Load8Splat { .. } => Opcode::V8x16LoadSplat,
        Operator::V128Load16Splat { .. } => Opcode::V16x8LoadSplat,
        Operator::V128Load32Splat { .. } => Opcode::V32x4LoadSplat,
        Operator::V128Load64Splat { .. } => Opcode::V64x2LoadSplat,
        Operator::I8x16NarrowI16x8S { .. } => Opcode::I8x16NarrowI16x8S,
        Operator::I8x16NarrowI16x8U { .. } => Opcode::I8x16NarrowI16x8U,
        Operator::I16x8NarrowI32x4S { .. } => Opcode::I16x8NarrowI32x4S,
        Operator::I16x8NarrowI32x4U { .. } => Opcode::I16x8NarrowI32x4U,
        Operator::I16x8ExtendLowI8x16S { .. } => Opcode::I16x8WidenLowI8x16S,
        Operator::I16x8ExtendHighI8x16S { .. } => Opcode::I16x8WidenHighI8x16S,
        Operator::I16x8ExtendLowI8x16U { .. } => Opcode::I16x8WidenLowI8x16U,
        Operator::I16x8ExtendHighI8x16U { .. } => Opcode::I16x8WidenHighI8x16U,
        Operator::I32x4ExtendLowI16x8S { .. } => Opcode::I32x4WidenLowI16x8S,
        Operator::I32x4ExtendHighI16x8S { .. } => Opcode::I32x4WidenHighI16x8S,
        Operator::I32x4ExtendLowI16x8U { .. } => Opcode::I32x4WidenLowI16x8U,
        Operator::I32x4ExtendHighI16x8U { .. } => Opcode::I32x4WidenHighI16x8U,
        Operator::V128Load8x8S { .. } => Opcode::I16x8Load8x8S,
        Operator::V128Load8x8U { .. } => Opcode::I16x8Load8x8U,
        Operator::V128Load16x4S { .. } => Opcode::I32x4Load16x4S,
        Operator::V128Load16x4U { .. } => Opcode::I32x4Load16x4U,
        Operator::V128Load32x2S { .. } => Opcode::I64x2Load32x2S,
        Operator::V128Load32x2U { .. } => Opcode::I64x2Load32x2U,
        Operator::I8x16AvgrU { .. } => Opcode::I8x16RoundingAverageU,
        Operator::I16x8AvgrU { .. } => Opcode::I16x8RoundingAverageU,
        _ => return None,
    };
    Some(opcode)
}

/// Price of a single operator. Operators without an accounted opcode are
/// charged the most expensive price in the table.
#[cfg_attr(not(feature = "fuzz-coverage"), inline)]
pub(crate) fn operator_cost(costs: &OpcodeCosts, operator: &Operator) -> u32 {
    match opcode_of(operator) {
        Some(opcode) => costs.cost(opcode),
        None => costs.max_cost(),
    }
}

/// Number of locals declared by each function body of the module, in order.
pub(crate) fn declared_locals(bytecode: &[u8]) -> anyhow::Result<Vec<u64>> {
    let mut out = Vec::new();
    for payload in Parser::new(0).parse_all(bytecode) {
        if let Payload::CodeSectionEntry(body) = payload.context("Malformed module.")? {
            let mut reader = body.get_locals_reader()?;
            let mut count = 0u64;
            for _ in 0..reader.get_count() {
                let (n, _) = reader.read()?;
                count += u64::from(n);
            }
            out.push(count);
        }
    }
    Ok(out)
}

/// Cost of allocating the locals of all functions, where the first
/// `unmetered` locals of each function are free.
pub(crate) fn locals_cost(
    bytecode: &[u8],
    unmetered: u32,
    costs: &OpcodeCosts,
) -> anyhow::Result<u64> {
    let per_local = u64::from(costs.cost(Opcode::LocalAllocate));
    let total = declared_locals(bytecode)?
        .into_iter()
        .map(|n| n.saturating_sub(u64::from(unmetered)).saturating_mul(per_local))
        .fold(0u64, u64::saturating_add);
    Ok(total)
}
