//! Loop nests shared by the integration tests.

#![allow(dead_code)]

use loopsight_analyzer::ir::{
    BinaryOp, ComparePredicate, FunctionBuilder, FunctionIr, Operand, ValueId,
};

fn n() -> Operand {
    Operand::symbol("n")
}

/// `for i: C[i] = A[i] + B[i]`
pub fn vector_add() -> FunctionIr {
    let mut b = FunctionBuilder::new("vector_add");
    b.source_file("kernels.c");
    let i = b.counted_loop("i", n());
    b.set_loop_line(&i, 10);
    let a = b.load_element("A", vec![i.iv.into()]);
    let bv = b.load_element("B", vec![i.iv.into()]);
    let sum = b.binary(BinaryOp::FAdd, a, bv);
    b.store_element("C", vec![i.iv.into()], sum);
    b.close_loop(&i);
    b.ret(None);
    b.build()
}

/// `for i: for j: C[i][j] = A[i][j] + B[i][j]`
pub fn matrix_add() -> FunctionIr {
    let mut b = FunctionBuilder::new("matrix_add");
    b.source_file("kernels.c");
    let i = b.counted_loop("i", n());
    b.set_loop_line(&i, 20);
    let j = b.counted_loop("j", Operand::symbol("m"));
    b.set_loop_line(&j, 21);
    let a = b.load_element("A", vec![i.iv.into(), j.iv.into()]);
    let bv = b.load_element("B", vec![i.iv.into(), j.iv.into()]);
    let sum = b.binary(BinaryOp::FAdd, a, bv);
    b.store_element("C", vec![i.iv.into(), j.iv.into()], sum);
    b.close_loop(&j);
    b.close_loop(&i);
    b.ret(None);
    b.build()
}

/// `for i: sum = sum + A[i] * A[i]`
pub fn sum_of_squares() -> FunctionIr {
    let mut b = FunctionBuilder::new("sum_of_squares");
    b.source_file("norms.c");
    let i = b.counted_loop("i", n());
    b.set_loop_line(&i, 5);
    let sum = b.carried(&i, "sum", 0.0f64);
    let x = b.load_element("A", vec![i.iv.into()]);
    let square = b.binary(BinaryOp::FMul, x, x);
    let next = b.binary(BinaryOp::FAdd, sum, square);
    b.update_carried(&i, sum, next);
    b.close_loop(&i);
    b.ret(Some(sum.into()));
    b.build()
}

/// `for i: total = total + A[i]`
pub fn plain_sum() -> FunctionIr {
    let mut b = FunctionBuilder::new("plain_sum");
    let i = b.counted_loop("i", n());
    let total = b.carried(&i, "total", 0i64);
    let x = b.load_element("A", vec![i.iv.into()]);
    let next = b.binary(BinaryOp::Add, total, x);
    b.update_carried(&i, total, next);
    b.close_loop(&i);
    b.ret(Some(total.into()));
    b.build()
}

/// `for i: B[i] = A[idx[i]]`
pub fn gather() -> FunctionIr {
    let mut b = FunctionBuilder::new("gather");
    let i = b.counted_loop("i", n());
    let k = b.load_element("idx", vec![i.iv.into()]);
    let x = b.load_element("A", vec![k.into()]);
    b.store_element("B", vec![i.iv.into()], x);
    b.close_loop(&i);
    b.ret(None);
    b.build()
}

/// `for i: for j: for k: C[i][j] += A[i][k] * B[k][j]`
pub fn matmul() -> FunctionIr {
    let mut b = FunctionBuilder::new("matmul");
    b.source_file("gemm.c");
    let i = b.counted_loop("i", n());
    let j = b.counted_loop("j", n());
    let k = b.counted_loop("k", n());
    let a = b.load_element("A", vec![i.iv.into(), k.iv.into()]);
    let bv = b.load_element("B", vec![k.iv.into(), j.iv.into()]);
    let product = b.binary(BinaryOp::FMul, a, bv);
    let c = b.load_element("C", vec![i.iv.into(), j.iv.into()]);
    let sum = b.binary(BinaryOp::FAdd, c, product);
    b.store_element("C", vec![i.iv.into(), j.iv.into()], sum);
    b.close_loop(&k);
    b.close_loop(&j);
    b.close_loop(&i);
    b.ret(None);
    b.build()
}

/// `for i: A[i] = A[i - 1] + B[i]`
pub fn prefix_sum() -> FunctionIr {
    let mut b = FunctionBuilder::new("prefix_sum");
    let i = b.counted_loop("i", n());
    let prev = b.binary(BinaryOp::Sub, i.iv, 1i64);
    let left = b.load_element("A", vec![prev.into()]);
    let x = b.load_element("B", vec![i.iv.into()]);
    let sum = b.binary(BinaryOp::Add, left, x);
    b.store_element("A", vec![i.iv.into()], sum);
    b.close_loop(&i);
    b.ret(None);
    b.build()
}

/// `for i: B[i] = A[i - 1] + A[i] + A[i + 1]`
pub fn stencil_1d() -> FunctionIr {
    let mut b = FunctionBuilder::new("stencil_1d");
    let i = b.counted_loop("i", n());
    let before = b.binary(BinaryOp::Sub, i.iv, 1i64);
    let after = b.binary(BinaryOp::Add, i.iv, 1i64);
    let l = b.load_element("A", vec![before.into()]);
    let c = b.load_element("A", vec![i.iv.into()]);
    let r = b.load_element("A", vec![after.into()]);
    let lc = b.binary(BinaryOp::FAdd, l, c);
    let sum = b.binary(BinaryOp::FAdd, lc, r);
    b.store_element("B", vec![i.iv.into()], sum);
    b.close_loop(&i);
    b.ret(None);
    b.build()
}

/// `for i: log_value(A[i])` with an impure call.
pub fn impure_call() -> FunctionIr {
    let mut b = FunctionBuilder::new("impure_call");
    let i = b.counted_loop("i", n());
    let x = b.load_element("A", vec![i.iv.into()]);
    b.call("log_value", vec![x.into()], false);
    b.close_loop(&i);
    b.ret(None);
    b.build()
}

/// `iv + delta`, or `iv` itself for a zero delta.
fn shifted(b: &mut FunctionBuilder, iv: ValueId, delta: i64) -> Operand {
    if delta == 0 {
        iv.into()
    } else {
        b.binary(BinaryOp::Add, iv, delta).into()
    }
}

/// `for i: for j: out[i][j] = sum of w[di][dj] * in[i+di][j+dj]` over a 3x3 kernel.
pub fn conv_3x3() -> FunctionIr {
    const KERNEL: [[f64; 3]; 3] = [
        [0.0625, 0.125, 0.0625],
        [0.125, 0.25, 0.125],
        [0.0625, 0.125, 0.0625],
    ];
    let mut b = FunctionBuilder::new("conv_3x3");
    b.source_file("filters.c");
    let i = b.counted_loop("i", n());
    let rows: Vec<Operand> = (-1..=1).map(|d| shifted(&mut b, i.iv, d)).collect();
    let j = b.counted_loop("j", Operand::symbol("m"));
    let cols: Vec<Operand> = (-1..=1).map(|d| shifted(&mut b, j.iv, d)).collect();

    let mut total: Option<ValueId> = None;
    for (r, row) in rows.iter().enumerate() {
        for (c, col) in cols.iter().enumerate() {
            let x = b.load_element("in", vec![row.clone(), col.clone()]);
            let weighted = b.binary(BinaryOp::FMul, x, KERNEL[r][c]);
            total = Some(match total {
                Some(t) => b.binary(BinaryOp::FAdd, t, weighted),
                None => weighted,
            });
        }
    }
    if let Some(total) = total {
        b.store_element("out", vec![i.iv.into(), j.iv.into()], total);
    }
    b.close_loop(&j);
    b.close_loop(&i);
    b.ret(None);
    b.build()
}

/// `for i: for j: out[i][j] = in[i-1][j] + in[i][j-1] + in[i][j+1] + in[i+1][j]`
pub fn blur_cross() -> FunctionIr {
    let mut b = FunctionBuilder::new("blur_cross");
    let i = b.counted_loop("i", n());
    let up = shifted(&mut b, i.iv, -1);
    let down = shifted(&mut b, i.iv, 1);
    let j = b.counted_loop("j", Operand::symbol("m"));
    let left = shifted(&mut b, j.iv, -1);
    let right = shifted(&mut b, j.iv, 1);
    let north = b.load_element("in", vec![up, j.iv.into()]);
    let west = b.load_element("in", vec![i.iv.into(), left]);
    let east = b.load_element("in", vec![i.iv.into(), right]);
    let south = b.load_element("in", vec![down, j.iv.into()]);
    let sum = b.binary(BinaryOp::FAdd, north, west);
    let sum = b.binary(BinaryOp::FAdd, sum, east);
    let sum = b.binary(BinaryOp::FAdd, sum, south);
    b.store_element("out", vec![i.iv.into(), j.iv.into()], sum);
    b.close_loop(&j);
    b.close_loop(&i);
    b.ret(None);
    b.build()
}

/// `for i: for j: B[i][j] = A[i][j] * s`
pub fn matrix_scale() -> FunctionIr {
    let mut b = FunctionBuilder::new("matrix_scale");
    let i = b.counted_loop("i", n());
    let j = b.counted_loop("j", Operand::symbol("m"));
    let a = b.load_element("A", vec![i.iv.into(), j.iv.into()]);
    let scaled = b.binary(BinaryOp::FMul, a, Operand::symbol("s"));
    b.store_element("B", vec![i.iv.into(), j.iv.into()], scaled);
    b.close_loop(&j);
    b.close_loop(&i);
    b.ret(None);
    b.build()
}

/// `for i: for j: B[i][j] = A[i][j]`
pub fn copy_2d() -> FunctionIr {
    let mut b = FunctionBuilder::new("copy_2d");
    let i = b.counted_loop("i", n());
    let j = b.counted_loop("j", Operand::symbol("m"));
    let a = b.load_element("A", vec![i.iv.into(), j.iv.into()]);
    b.store_element("B", vec![i.iv.into(), j.iv.into()], a);
    b.close_loop(&j);
    b.close_loop(&i);
    b.ret(None);
    b.build()
}

/// `for i: best = A[i] > best ? A[i] : best`
pub fn running_max() -> FunctionIr {
    let mut b = FunctionBuilder::new("running_max");
    let i = b.counted_loop("i", n());
    let best = b.carried(&i, "best", f64::MIN);
    let x = b.load_element("A", vec![i.iv.into()]);
    let greater = b.compare(ComparePredicate::Gt, x, best);
    let next = b.select(greater, x, best);
    b.update_carried(&i, best, next);
    b.close_loop(&i);
    b.ret(Some(best.into()));
    b.build()
}

/// `for i: B[i] = sqrt(A[i]) * 2.0` with a pure `sqrt`.
pub fn scaled_sqrt() -> FunctionIr {
    let mut b = FunctionBuilder::new("scaled_sqrt");
    let i = b.counted_loop("i", n());
    let x = b.load_element("A", vec![i.iv.into()]);
    let root = b.call("sqrt", vec![x.into()], true);
    let twice = b.binary(BinaryOp::FMul, root, 2.0f64);
    b.store_element("B", vec![i.iv.into()], twice);
    b.close_loop(&i);
    b.ret(None);
    b.build()
}

/// `for i: B[i] = hash(i)` with a pure `hash`.
pub fn fill_hashed() -> FunctionIr {
    let mut b = FunctionBuilder::new("fill_hashed");
    let i = b.counted_loop("i", n());
    let h = b.call("hash", vec![i.iv.into()], true);
    b.store_element("B", vec![i.iv.into()], h);
    b.close_loop(&i);
    b.ret(None);
    b.build()
}

pub fn all() -> Vec<FunctionIr> {
    vec![
        vector_add(),
        matrix_add(),
        sum_of_squares(),
        plain_sum(),
        gather(),
        matmul(),
        prefix_sum(),
        stencil_1d(),
        impure_call(),
        conv_3x3(),
        blur_cross(),
        matrix_scale(),
        copy_2d(),
        running_max(),
        scaled_sqrt(),
        fill_hashed(),
    ]
}
