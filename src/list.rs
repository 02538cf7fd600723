use std::{marker::PhantomData, ptr::NonNull};

/// Optional non-null pointer to `T`.
pub(crate) type Link<T> = Option<NonNull<T>>;

pub(crate) struct Node<T> {
    /// Pointer to the next node of the list
    pub next: Link<Self>,
    /// Pointer to the previous node of the list
    pub prev: Link<Self>,
    /// Element of the node
    pub data: T,
}

/// Doubly-linked list whose nodes live at caller-chosen addresses.
///
/// Because this crate is itself an allocator, the list can never obtain
/// node storage from the global allocator. Every operation that creates
/// a node receives the `addr` where the node has to be written, and
/// removal only splices a node out, it does not release its storage.
/// Deciding where node memory comes from (and when it goes away) is the
/// caller's job.
pub(crate) struct List<T> {
    head: Link<Node<T>>,
    tail: Link<Node<T>>,
    len: usize,
    marker: PhantomData<T>,
}

pub(crate) struct Iter<'a, T> {
    current: Link<Node<T>>,
    remaining: usize,
    marker: PhantomData<&'a T>,
}

impl<T> List<T> {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn first(&self) -> Link<Node<T>> {
        self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a new node at the tail of the list, writing it at `addr`.
    ///
    /// **SAFETY**: `addr` must be valid for writes of `Node<T>` and
    /// suitably aligned, and must stay valid until the node is removed.
    pub unsafe fn append(&mut self, data: T, addr: NonNull<u8>) -> NonNull<Node<T>> {
        let node = addr.cast::<Node<T>>();

        unsafe {
            node.as_ptr().write(Node {
                next: None,
                prev: self.tail,
                data,
            });

            if let Some(mut tail) = self.tail {
                tail.as_mut().next = Some(node);
            } else {
                self.head = Some(node);
            }

            self.tail = Some(node);
            self.len += 1;

            node
        }
    }

    /// Inserts a new node right before `before`, writing it at `addr`.
    /// Keeping the list sorted reduces to finding the first node the new
    /// element has to precede and calling this.
    ///
    /// **SAFETY**: `addr` as in [`List::append`]; `before` must be a node
    /// of this list.
    pub unsafe fn insert_before(
        &mut self,
        mut before: NonNull<Node<T>>,
        data: T,
        addr: NonNull<u8>,
    ) -> NonNull<Node<T>> {
        let node = addr.cast::<Node<T>>();

        unsafe {
            node.as_ptr().write(Node {
                next: Some(before),
                prev: before.as_ref().prev,
                data,
            });

            if let Some(mut prev) = before.as_ref().prev {
                prev.as_mut().next = Some(node);
            } else {
                self.head = Some(node);
            }

            before.as_mut().prev = Some(node);
            self.len += 1;

            node
        }
    }

    /// Splices `node` out of the list. The node's storage is untouched;
    /// releasing it is up to the caller.
    ///
    /// **SAFETY**: `node` must be a node of this list.
    pub unsafe fn remove(&mut self, node: NonNull<Node<T>>) {
        unsafe {
            match (node.as_ref().prev, node.as_ref().next) {
                (None, None) => {
                    self.head = None;
                    self.tail = None;
                }
                (None, Some(mut next)) => {
                    next.as_mut().prev = None;
                    self.head = Some(next);
                }
                (Some(mut prev), None) => {
                    prev.as_mut().next = None;
                    self.tail = Some(prev);
                }
                (Some(mut prev), Some(mut next)) => {
                    prev.as_mut().next = Some(next);
                    next.as_mut().prev = Some(prev);
                }
            }
        }

        self.len -= 1;
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            current: self.head,
            remaining: self.len,
            marker: PhantomData,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;

        unsafe {
            self.current = node.as_ref().next;
            self.remaining -= 1;

            Some(&node.as_ref().data)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::MaybeUninit;

    // Backing storage for the nodes the tests create. The list writes
    // nodes wherever it is told to, so a stack slot per node is enough.
    fn slot() -> Box<MaybeUninit<Node<u32>>> {
        Box::new(MaybeUninit::uninit())
    }

    fn addr_of(slot: &mut MaybeUninit<Node<u32>>) -> NonNull<u8> {
        NonNull::new(slot.as_mut_ptr().cast::<u8>()).unwrap()
    }

    fn collect(list: &List<u32>) -> Vec<u32> {
        list.iter().copied().collect()
    }

    #[test]
    fn new_list_is_empty() {
        let list: List<u32> = List::new();

        assert_eq!(list.len(), 0);
        assert!(list.is_empty());
        assert!(list.iter().next().is_none());
    }

    #[test]
    fn append_links_nodes_in_order() {
        let mut list: List<u32> = List::new();
        let (mut a, mut b, mut c) = (slot(), slot(), slot());

        unsafe {
            list.append(1, addr_of(&mut a));
            list.append(2, addr_of(&mut b));
            list.append(3, addr_of(&mut c));
        }

        assert_eq!(list.len(), 3);
        assert_eq!(collect(&list), vec![1, 2, 3]);
    }

    #[test]
    fn insert_before_head_becomes_new_head() {
        let mut list: List<u32> = List::new();
        let (mut a, mut b) = (slot(), slot());

        unsafe {
            let head = list.append(2, addr_of(&mut a));
            list.insert_before(head, 1, addr_of(&mut b));
        }

        assert_eq!(collect(&list), vec![1, 2]);
    }

    #[test]
    fn insert_before_middle_node() {
        let mut list: List<u32> = List::new();
        let (mut a, mut b, mut c) = (slot(), slot(), slot());

        unsafe {
            list.append(1, addr_of(&mut a));
            let tail = list.append(3, addr_of(&mut b));
            list.insert_before(tail, 2, addr_of(&mut c));
        }

        assert_eq!(collect(&list), vec![1, 2, 3]);
    }

    #[test]
    fn remove_head_middle_tail_and_only_node() {
        let mut list: List<u32> = List::new();
        let (mut a, mut b, mut c) = (slot(), slot(), slot());

        unsafe {
            let first = list.append(1, addr_of(&mut a));
            let second = list.append(2, addr_of(&mut b));
            let third = list.append(3, addr_of(&mut c));

            list.remove(second);
            assert_eq!(collect(&list), vec![1, 3]);

            list.remove(first);
            assert_eq!(collect(&list), vec![3]);

            list.remove(third);
        }

        assert!(list.is_empty());
        assert!(list.first().is_none());
    }
}
