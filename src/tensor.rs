//! Shared-storage parameter tensor
//!
//! A `Tensor` is a flat `f32` buffer plus an accumulated gradient buffer.
//! Cloning a `Tensor` aliases the same storage, so a layer and the optimizer
//! can hold the same parameter and observe each other's writes. Gradients
//! accumulate across backward calls until `zero_grad` is called.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use ndarray::Array1;

/// A trainable parameter tensor with shared data and gradient storage.
#[derive(Clone)]
pub struct Tensor {
    data: Rc<RefCell<Array1<f32>>>,
    grad: Rc<RefCell<Option<Array1<f32>>>>,
    requires_grad: bool,
}

impl Tensor {
    /// Create a tensor from a plain vector.
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self::from_array(Array1::from(data), requires_grad)
    }

    /// Create a tensor from an ndarray buffer.
    pub fn from_array(data: Array1<f32>, requires_grad: bool) -> Self {
        Self {
            data: Rc::new(RefCell::new(data)),
            grad: Rc::new(RefCell::new(None)),
            requires_grad,
        }
    }

    /// Create a zero-filled tensor.
    pub fn zeros(len: usize, requires_grad: bool) -> Self {
        Self::from_array(Array1::zeros(len), requires_grad)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    /// True if the tensor has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether gradients are tracked for this tensor.
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Borrow the underlying values.
    pub fn data(&self) -> Ref<'_, Array1<f32>> {
        self.data.borrow()
    }

    /// Mutably borrow the underlying values.
    pub fn data_mut(&self) -> RefMut<'_, Array1<f32>> {
        self.data.borrow_mut()
    }

    /// Snapshot of the accumulated gradient, if any.
    pub fn grad(&self) -> Option<Array1<f32>> {
        self.grad.borrow().clone()
    }

    /// Replace the accumulated gradient.
    pub fn set_grad(&self, grad: Array1<f32>) {
        *self.grad.borrow_mut() = Some(grad);
    }

    /// Add `grad` into the accumulated gradient, allocating it on first use.
    pub fn accumulate_grad(&self, grad: &Array1<f32>) {
        let mut slot = self.grad.borrow_mut();
        match slot.as_mut() {
            Some(existing) => *existing += grad,
            None => *slot = Some(grad.clone()),
        }
    }

    /// Mutably borrow the gradient buffer, allocating zeros on first use.
    ///
    /// Layers write their parameter gradients through this so that repeated
    /// backward calls accumulate.
    pub fn grad_mut(&self) -> RefMut<'_, Array1<f32>> {
        {
            let mut slot = self.grad.borrow_mut();
            if slot.is_none() {
                *slot = Some(Array1::zeros(self.data.borrow().len()));
            }
        }
        RefMut::map(self.grad.borrow_mut(), |slot| {
            slot.as_mut().expect("gradient buffer allocated above")
        })
    }

    /// Drop the accumulated gradient.
    pub fn zero_grad(&self) {
        *self.grad.borrow_mut() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_clone_aliases_storage() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
        let b = a.clone();

        b.data_mut()[0] = 9.0;
        assert_eq!(a.data()[0], 9.0);

        b.set_grad(arr1(&[0.5, 0.5, 0.5]));
        assert!(a.grad().is_some());
    }

    #[test]
    fn test_accumulate_grad() {
        let t = Tensor::zeros(2, true);
        t.accumulate_grad(&arr1(&[1.0, 2.0]));
        t.accumulate_grad(&arr1(&[0.5, 0.5]));

        let g = t.grad().expect("gradient set");
        assert_eq!(g[0], 1.5);
        assert_eq!(g[1], 2.5);
    }

    #[test]
    fn test_grad_mut_allocates_zeros() {
        let t = Tensor::from_vec(vec![1.0, 2.0], true);
        assert!(t.grad().is_none());

        t.grad_mut()[1] = 3.0;
        let g = t.grad().expect("gradient set");
        assert_eq!(g[0], 0.0);
        assert_eq!(g[1], 3.0);
    }

    #[test]
    fn test_zero_grad() {
        let t = Tensor::from_vec(vec![1.0], true);
        t.set_grad(arr1(&[2.0]));
        t.zero_grad();
        assert!(t.grad().is_none());
    }
}
